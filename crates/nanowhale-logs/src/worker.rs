use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::process::LogProcess;
use crate::sink::LogSink;
use nanowhale_engine::EngineClient;
use nanowhale_types::{Timestamp, WorkerState};

/// How long a process that closed its output gets to report an exit status
const EXIT_GRACE: Duration = Duration::from_secs(2);

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one worker, unique for the lifetime of the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Time bounds of one log stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamBounds {
    /// Start of the stream; `None` means from the beginning of the log
    pub since: Option<Timestamp>,

    /// End of the stream; `None` means follow indefinitely
    pub until: Option<Timestamp>,
}

impl StreamBounds {
    pub fn new(since: Option<Timestamp>, until: Option<Timestamp>) -> Self {
        Self { since, until }
    }

    /// Streams without an upper bound follow new output
    pub fn follows(&self) -> bool {
        self.until.is_none()
    }
}

/// Build the engine's log subcommand:
/// `logs [--timestamps] [--follow] [--since=T] [--until=T] <target>`
pub fn log_args(target: &str, bounds: &StreamBounds, show_timestamps: bool) -> Vec<String> {
    let mut args = vec!["logs".to_string()];

    if show_timestamps {
        args.push("--timestamps".to_string());
    }
    if bounds.follows() {
        args.push("--follow".to_string());
    }
    if let Some(since) = bounds.since {
        args.push(format!("--since={since}"));
    }
    if let Some(until) = bounds.until {
        args.push(format!("--until={until}"));
    }

    args.push(target.to_string());
    args
}

struct Shared {
    id: WorkerId,
    target: String,
    bounds: StreamBounds,
    show_timestamps: bool,
    /// True from creation until the worker ends or is terminated; never set back
    alive: AtomicBool,
    state: Mutex<WorkerState>,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Cloneable control handle for a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.shared.id
    }

    pub fn target(&self) -> &str {
        &self.shared.target
    }

    pub fn bounds(&self) -> StreamBounds {
        self.shared.bounds
    }

    pub fn show_timestamps(&self) -> bool {
        self.shared.show_timestamps
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    /// Engine arguments this worker streams with
    pub fn log_args(&self) -> Vec<String> {
        log_args(&self.shared.target, &self.shared.bounds, self.shared.show_timestamps)
    }

    /// Ask the worker to stop. Safe from any thread, any number of times;
    /// returns immediately and the worker task kills its process.
    pub fn terminate(&self) {
        if self.shared.alive.swap(false, Ordering::SeqCst) {
            debug!(worker = %self.shared.id, "terminating log stream");
        }
        self.shared.cancel.cancel();
    }

    /// Resolve once the worker reached a terminal state and ran its exit callback
    pub async fn wait(&self) {
        self.shared.done.cancelled().await;
    }

    fn set_state(&self, state: WorkerState) {
        *self.shared.state.lock() = state;
    }

    fn finish(&self, state: WorkerState) {
        self.set_state(state);
        self.shared.alive.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.shared.id)
            .field("target", &self.shared.target)
            .field("bounds", &self.shared.bounds)
            .field("state", &self.state())
            .finish()
    }
}

type ExitCallback = Box<dyn FnOnce(WorkerId) + Send + 'static>;

/// Runs the exit callback exactly once: on the terminal transition, or on
/// drop if the task is torn down before getting there.
struct ExitGuard {
    id: WorkerId,
    callback: Mutex<Option<ExitCallback>>,
    done: CancellationToken,
}

impl ExitGuard {
    fn fire(&self) {
        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            callback(self.id);
        }
        self.done.cancel();
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

/// One log tail: one engine process, one lifecycle, never restarted.
pub struct LogStreamWorker {
    handle: WorkerHandle,
    engine: EngineClient,
    sink: LogSink,
    epoch: u64,
    on_exit: ExitGuard,
}

impl LogStreamWorker {
    /// Create a worker. `epoch` tags everything it writes to the sink and
    /// `on_exit` runs once when it ends, whichever way it ends.
    pub fn new<F>(
        engine: EngineClient,
        sink: LogSink,
        epoch: u64,
        target: impl Into<String>,
        bounds: StreamBounds,
        show_timestamps: bool,
        on_exit: F,
    ) -> Self
    where
        F: FnOnce(WorkerId) + Send + 'static,
    {
        let id = WorkerId::next();
        let done = CancellationToken::new();
        let handle = WorkerHandle {
            shared: Arc::new(Shared {
                id,
                target: target.into(),
                bounds,
                show_timestamps,
                alive: AtomicBool::new(true),
                state: Mutex::new(WorkerState::Starting),
                cancel: CancellationToken::new(),
                done: done.clone(),
            }),
        };

        Self {
            handle,
            engine,
            sink,
            epoch,
            on_exit: ExitGuard {
                id,
                callback: Mutex::new(Some(Box::new(on_exit))),
                done,
            },
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Run the worker on its own task
    pub fn start(self) -> JoinHandle<WorkerState> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> WorkerState {
        let state = self.stream().await;
        self.handle.finish(state);
        info!(worker = %self.handle.id(), container = %self.handle.target(), state = state.label(), "log stream ended");
        self.on_exit.fire();
        state
    }

    async fn stream(&self) -> WorkerState {
        if !self.handle.is_alive() {
            return WorkerState::Terminated;
        }

        let args = self.handle.log_args();
        debug!(worker = %self.handle.id(), ?args, "starting log stream");

        let mut process = match LogProcess::start(&self.engine, &args) {
            Ok(process) => process,
            Err(e) => return self.fail(e),
        };
        self.handle.set_state(WorkerState::Streaming);

        let state = self.pump(&mut process).await;
        // Covers a process that is still running despite EOF or an error
        process.terminate();
        state
    }

    async fn pump(&self, process: &mut LogProcess) -> WorkerState {
        let cancel = self.handle.shared.cancel.clone();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return WorkerState::Terminated,
                line = process.read_line() => line,
            };

            match next {
                Ok(Some(line)) => {
                    if !self.handle.is_alive() {
                        return WorkerState::Terminated;
                    }
                    self.sink.append(self.epoch, self.handle.show_timestamps(), line);
                }
                Ok(None) => break,
                Err(e) => {
                    process.terminate();
                    return self.fail(e);
                }
            }
        }

        let exit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WorkerState::Terminated,
            exit = tokio::time::timeout(EXIT_GRACE, process.wait()) => exit,
        };

        match exit {
            Ok(Ok(status)) if status.success() => {
                if let Some(until) = self.handle.bounds().until {
                    self.sink.notice(
                        self.epoch,
                        format!("--- Log stream finished at {until}. No more logs. ---"),
                    );
                }
                WorkerState::EndedNaturally
            }
            Ok(Ok(status)) => self.fail(StreamError::Exit(status)),
            Ok(Err(e)) => self.fail(e),
            Err(_) => self.fail(StreamError::Stalled(EXIT_GRACE)),
        }
    }

    /// Report a failure as one marked line, unless the worker was terminated
    fn fail(&self, error: StreamError) -> WorkerState {
        if !self.handle.is_alive() {
            return WorkerState::Terminated;
        }
        warn!(worker = %self.handle.id(), container = %self.handle.target(), %error, "log stream failed");
        self.sink
            .error(self.epoch, format!("--- ERROR: Log streamer failed: {error} ---"));
        WorkerState::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn test_follow_args_with_since() {
        let bounds = StreamBounds::new(Some(ts("2024-03-01T12:00:00.123456789Z")), None);
        let args = log_args("abc123", &bounds, true);
        assert_eq!(
            args,
            vec![
                "logs",
                "--timestamps",
                "--follow",
                "--since=2024-03-01T12:00:00.123456789Z",
                "abc123",
            ]
        );
    }

    #[test]
    fn test_bounded_args_never_follow() {
        let bounds = StreamBounds::new(None, Some(ts("2024-01-02T00:00:00Z")));
        let args = log_args("abc123", &bounds, false);
        assert_eq!(args, vec!["logs", "--until=2024-01-02T00:00:00Z", "abc123"]);
    }

    #[test]
    fn test_history_args() {
        let args = log_args("web", &StreamBounds::default(), true);
        assert_eq!(args, vec!["logs", "--timestamps", "--follow", "web"]);
    }

    #[test]
    fn test_range_args_target_last() {
        let bounds = StreamBounds::new(
            Some(ts("2024-01-01T00:00:00Z")),
            Some(ts("2024-01-02T00:00:00Z")),
        );
        let args = log_args("web", &bounds, false);
        assert_eq!(
            args,
            vec![
                "logs",
                "--since=2024-01-01T00:00:00Z",
                "--until=2024-01-02T00:00:00Z",
                "web",
            ]
        );
    }

    #[cfg(unix)]
    mod process {
        use std::sync::atomic::AtomicUsize;

        use tokio::sync::mpsc;

        use super::*;
        use crate::sink::SinkEvent;
        use nanowhale_engine::EngineConfig;
        use nanowhale_types::LineKind;

        fn sh(script: &str) -> EngineClient {
            EngineClient::new(EngineConfig {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "docker".to_string()],
                ..EngineConfig::default()
            })
        }

        fn spawn(
            script: &str,
            bounds: StreamBounds,
        ) -> (
            WorkerHandle,
            JoinHandle<WorkerState>,
            mpsc::UnboundedReceiver<SinkEvent>,
            Arc<AtomicUsize>,
        ) {
            let (sink, rx) = LogSink::channel();
            let exits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&exits);
            let worker = LogStreamWorker::new(sh(script), sink, 0, "web", bounds, false, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let handle = worker.handle();
            (handle, worker.start(), rx, exits)
        }

        fn drain(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> Vec<(LineKind, String)> {
            let mut lines = Vec::new();
            while let Ok(event) = rx.try_recv() {
                if let SinkEvent::Append { kind, line, .. } = event {
                    lines.push((kind, line));
                }
            }
            lines
        }

        #[tokio::test]
        async fn test_bounded_stream_ends_naturally_with_one_marker() {
            let until = ts("2024-01-02T00:00:00Z");
            let (handle, task, mut rx, exits) =
                spawn("echo one; echo two", StreamBounds::new(None, Some(until)));

            assert_eq!(task.await.unwrap(), WorkerState::EndedNaturally);
            assert_eq!(handle.state(), WorkerState::EndedNaturally);
            assert!(!handle.is_alive());
            assert_eq!(exits.load(Ordering::SeqCst), 1);

            let lines = drain(&mut rx);
            assert_eq!(
                lines,
                vec![
                    (LineKind::Output, "one".to_string()),
                    (LineKind::Output, "two".to_string()),
                    (
                        LineKind::Notice,
                        "--- Log stream finished at 2024-01-02T00:00:00Z. No more logs. ---"
                            .to_string()
                    ),
                ]
            );
        }

        #[tokio::test]
        async fn test_follow_stream_clean_exit_has_no_marker() {
            let (_handle, task, mut rx, exits) = spawn("echo only", StreamBounds::default());

            assert_eq!(task.await.unwrap(), WorkerState::EndedNaturally);
            assert_eq!(exits.load(Ordering::SeqCst), 1);
            assert_eq!(drain(&mut rx), vec![(LineKind::Output, "only".to_string())]);
        }

        #[tokio::test]
        async fn test_process_receives_log_args() {
            let since = ts("2024-01-01T00:00:00Z");
            let (_handle, task, mut rx, _) =
                spawn(r#"echo "$@""#, StreamBounds::new(Some(since), None));

            task.await.unwrap();
            let lines = drain(&mut rx);
            assert_eq!(lines[0].1, "logs --follow --since=2024-01-01T00:00:00Z web");
        }

        #[tokio::test]
        async fn test_nonzero_exit_fails_with_one_error_line() {
            let (handle, task, mut rx, exits) = spawn(
                "echo 'Error: No such container: web' >&2; exit 1",
                StreamBounds::default(),
            );

            assert_eq!(task.await.unwrap(), WorkerState::Failed);
            assert_eq!(handle.state(), WorkerState::Failed);
            assert_eq!(exits.load(Ordering::SeqCst), 1);

            let lines = drain(&mut rx);
            assert_eq!(lines.len(), 2);
            assert_eq!(lines[0], (LineKind::Output, "Error: No such container: web".to_string()));
            assert_eq!(lines[1].0, LineKind::Error);
            assert!(lines[1].1.starts_with("--- ERROR: Log streamer failed:"));
        }

        #[tokio::test]
        async fn test_closed_output_without_exit_fails_after_grace() {
            let (handle, task, mut rx, exits) =
                spawn("echo last; exec >&- 2>&-; sleep 10", StreamBounds::default());

            let state = tokio::time::timeout(EXIT_GRACE * 3, task)
                .await
                .expect("stalled process was not given up on")
                .unwrap();
            assert_eq!(state, WorkerState::Failed);
            assert_eq!(handle.state(), WorkerState::Failed);
            assert_eq!(exits.load(Ordering::SeqCst), 1);

            let lines = drain(&mut rx);
            assert_eq!(lines[0], (LineKind::Output, "last".to_string()));
            let errors: Vec<_> = lines
                .iter()
                .filter(|(kind, _)| *kind == LineKind::Error)
                .collect();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].1.contains("did not exit"));

            // a late terminate changes nothing
            handle.terminate();
            assert_eq!(exits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_output_lines_carry_timestamp_flag() {
            let (sink, mut rx) = LogSink::channel();
            let worker = LogStreamWorker::new(
                sh("echo line"),
                sink,
                3,
                "web",
                StreamBounds::default(),
                true,
                |_| {},
            );

            assert_eq!(worker.start().await.unwrap(), WorkerState::EndedNaturally);
            assert_eq!(
                rx.try_recv().unwrap(),
                SinkEvent::Append {
                    epoch: 3,
                    kind: LineKind::Output,
                    stamped: true,
                    line: "line".to_string(),
                }
            );
        }

        #[tokio::test]
        async fn test_start_failure_reports_once() {
            let (sink, mut rx) = LogSink::channel();
            let exits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&exits);
            let engine = EngineClient::new(EngineConfig {
                program: "/nonexistent/nanowhale-engine".to_string(),
                ..EngineConfig::default()
            });
            let worker = LogStreamWorker::new(
                engine,
                sink,
                0,
                "web",
                StreamBounds::default(),
                true,
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            );

            assert_eq!(worker.start().await.unwrap(), WorkerState::Failed);
            assert_eq!(exits.load(Ordering::SeqCst), 1);

            let lines = drain(&mut rx);
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].0, LineKind::Error);
        }

        #[tokio::test]
        async fn test_terminate_twice_fires_exit_once() {
            let (handle, task, mut rx, exits) = spawn(
                "while true; do echo tick; sleep 0.05; done",
                StreamBounds::default(),
            );

            // let it stream for a bit
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert_eq!(handle.state(), WorkerState::Streaming);

            handle.terminate();
            handle.terminate();
            handle.wait().await;

            assert_eq!(task.await.unwrap(), WorkerState::Terminated);
            assert_eq!(exits.load(Ordering::SeqCst), 1);
            assert!(!handle.is_alive());

            handle.terminate();
            assert_eq!(exits.load(Ordering::SeqCst), 1);

            let lines = drain(&mut rx);
            assert!(!lines.is_empty());
            assert!(lines.iter().all(|(kind, _)| *kind == LineKind::Output));
        }

        #[tokio::test]
        async fn test_terminate_before_start_never_spawns() {
            let (sink, mut rx) = LogSink::channel();
            let worker = LogStreamWorker::new(
                sh("echo should-not-run"),
                sink,
                0,
                "web",
                StreamBounds::default(),
                false,
                |_| {},
            );
            let handle = worker.handle();
            handle.terminate();

            assert_eq!(worker.start().await.unwrap(), WorkerState::Terminated);
            assert!(drain(&mut rx).is_empty());
        }
    }
}
