use std::process::ExitStatus;
use std::time::Duration;

use nanowhale_engine::EngineError;
use thiserror::Error;

/// Failures inside the log streaming layer
#[derive(Debug, Error)]
pub enum StreamError {
    /// The log process could not be spawned.
    #[error("failed to start `{command}`: {source}")]
    Start {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the log process output failed mid-stream.
    #[error("failed to read log output: {0}")]
    Read(#[source] std::io::Error),

    /// The log process exited unsuccessfully.
    #[error("log process exited with {0}")]
    Exit(ExitStatus),

    /// The log process closed its output but kept running.
    #[error("log process closed its output but did not exit within {0:?}")]
    Stalled(Duration),

    /// A worker could not be stopped during teardown.
    #[error("failed to terminate worker: {0}")]
    Terminate(String),

    /// The engine clock could not be read.
    #[error("could not fetch current time: {0}")]
    TimeQuery(#[from] EngineError),
}
