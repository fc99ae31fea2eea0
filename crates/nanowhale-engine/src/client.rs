use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::resource::ResourceCommand;
use nanowhale_types::{ContainerInfo, ImageInfo, Timestamp, VolumeInfo};

/// Keeps a console window from flashing up for every engine call
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Handle for issuing commands to the container engine
#[derive(Clone, Debug)]
pub struct EngineClient {
    config: Arc<EngineConfig>,
}

impl EngineClient {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Program every engine subcommand is launched through
    pub fn program(&self) -> &str {
        &self.config.program
    }

    /// Build an engine subcommand: `<program> <prefix args> <args>`
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args).args(args);
        hide_console(&mut cmd);
        cmd
    }

    /// Render an engine subcommand for messages
    pub fn describe<S: AsRef<str>>(&self, args: &[S]) -> String {
        std::iter::once(self.config.program.as_str())
            .chain(self.config.args.iter().map(String::as_str))
            .chain(args.iter().map(|arg| arg.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run a request/response engine subcommand and return its stdout
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let cmd = self.command(args);
        output_within(cmd, self.describe(args), self.config.command_timeout()).await
    }

    /// Ask the engine host for its current UTC time
    pub async fn current_time(&self) -> Result<Timestamp> {
        let (program, args) = self
            .config
            .clock
            .split_first()
            .ok_or(EngineError::InvalidCommand("clock"))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        hide_console(&mut cmd);

        let command = self.config.clock.join(" ");
        let stdout = output_within(cmd, command.clone(), self.config.command_timeout()).await?;
        let stamp = stdout.trim();

        stamp.parse().map_err(|_| EngineError::Parse {
            command,
            output: stamp.to_string(),
        })
    }

    /// List all containers, running or not
    pub async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        self.list(&["ps", "-a", "--no-trunc", "--format", "{{json .}}"]).await
    }

    pub async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        self.list(&["images", "--no-trunc", "--format", "{{json .}}"]).await
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeInfo>> {
        self.list(&["volume", "ls", "--format", "{{json .}}"]).await
    }

    async fn list<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Vec<T>> {
        let stdout = self.run(args).await?;
        parse_json_lines(&self.describe(args), &stdout)
    }

    /// Name of a container's restart policy, `no` when it has none
    pub async fn restart_policy(&self, id: &str) -> Result<String> {
        let args = ["inspect", "--format", "{{.HostConfig.RestartPolicy.Name}}", id];
        let policy = self.run(&args).await?;
        let policy = policy.trim();
        Ok(if policy.is_empty() { "no" } else { policy }.to_string())
    }

    /// Run a management command and describe its outcome for the status line
    pub async fn execute(&self, command: &ResourceCommand) -> Result<String> {
        // A container that always restarts comes straight back after a stop
        let sticky_policy = match command {
            ResourceCommand::StopContainer(id) => self
                .restart_policy(id)
                .await
                .ok()
                .filter(|policy| matches!(policy.as_str(), "always" | "unless-stopped")),
            _ => None,
        };

        let stdout = self.run(&command.args()).await?;
        let mut message = command.success_message();

        if let Some(policy) = sticky_policy {
            message.push_str(&format!("; restart policy '{policy}' will start it again"));
        }
        if matches!(
            command,
            ResourceCommand::PruneContainers
                | ResourceCommand::PruneImages
                | ResourceCommand::PruneVolumes
        ) && let Some(summary) = stdout.lines().map(str::trim).rfind(|line| !line.is_empty())
        {
            message.push_str(". ");
            message.push_str(summary);
        }

        Ok(message)
    }
}

/// Parse one JSON object per line, as printed by `--format {{json .}}`
pub fn parse_json_lines<T: DeserializeOwned>(command: &str, stdout: &str) -> Result<Vec<T>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|_| EngineError::Parse {
                command: command.to_string(),
                output: line.to_string(),
            })
        })
        .collect()
}

async fn output_within(mut cmd: Command, command: String, timeout: Duration) -> Result<String> {
    debug!(%command, "running engine command");

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| EngineError::Spawn {
        command: command.clone(),
        source,
    })?;

    // Dropping the future on timeout drops the child, which kills it
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| EngineError::Spawn {
            command: command.clone(),
            source,
        })?,
        Err(_) => return Err(EngineError::Timeout { command, timeout }),
    };

    if !output.status.success() {
        return Err(EngineError::Failed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}
