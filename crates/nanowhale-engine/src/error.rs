//! Error types for engine commands.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors from running a command against the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configured command line has no program.
    #[error("empty {0} command")]
    InvalidCommand(&'static str),

    /// The program could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within the configured bound.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The command exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The command succeeded but printed something we could not interpret.
    #[error("unexpected output from `{command}`: {output}")]
    Parse { command: String, output: String },
}
