use std::io::{self, PipeReader};
use std::process::{ExitStatus, Stdio};

use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::StreamError;
use nanowhale_engine::EngineClient;

type LineResult = io::Result<String>;

/// A supervised engine process whose stdout and stderr are read as one
/// line stream.
///
/// Both descriptors of the child point at the same pipe, so lines come out
/// in exactly the order the process wrote them.
pub struct LogProcess {
    child: Child,
    lines: mpsc::UnboundedReceiver<LineResult>,
}

impl LogProcess {
    /// Spawn `<engine> <args>`. Must be called from within a tokio runtime.
    pub fn start(engine: &EngineClient, args: &[String]) -> Result<Self, StreamError> {
        let start_error = |source| StreamError::Start {
            command: engine.describe(args),
            source,
        };

        let (reader, writer) = io::pipe().map_err(start_error)?;
        let stderr = writer.try_clone().map_err(start_error)?;

        let mut cmd = engine.command(args);
        cmd.stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr)
            .kill_on_drop(true);

        let spawned = cmd.spawn();
        // Our copies of the write end must go, or the reader never sees EOF
        drop(cmd);
        let child = spawned.map_err(start_error)?;
        debug!(pid = ?child.id(), command = %engine.describe(args), "log process started");

        let (tx, lines) = mpsc::unbounded_channel();
        spawn_pipe_reader(reader, tx).map_err(start_error)?;

        Ok(Self { child, lines })
    }

    /// Next output line, or `None` once the output is closed
    pub async fn read_line(&mut self) -> Result<Option<String>, StreamError> {
        match self.lines.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(StreamError::Read(e)),
            None => Ok(None),
        }
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Signal the process to stop. Never waits; repeated calls are no-ops.
    pub fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "log process kill failed");
        }
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<ExitStatus, StreamError> {
        self.child.wait().await.map_err(StreamError::Read)
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

#[cfg(unix)]
fn spawn_pipe_reader(reader: PipeReader, tx: mpsc::UnboundedSender<LineResult>) -> io::Result<()> {
    use std::os::fd::OwnedFd;

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::unix::pipe;

    let pipe = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;

    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(decode_line(&buf))).is_err() {
                        // Supervisor dropped, stop reading
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });

    Ok(())
}

// Anonymous pipes cannot be registered with the reactor here, so the read
// end is drained on the blocking pool instead.
#[cfg(not(unix))]
fn spawn_pipe_reader(reader: PipeReader, tx: mpsc::UnboundedSender<LineResult>) -> io::Result<()> {
    use std::io::{BufRead, BufReader};

    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(decode_line(&buf))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });

    Ok(())
}
