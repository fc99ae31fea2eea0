//! Log streaming for nanowhale
//!
//! This crate tails a container's log through a supervised engine process,
//! restarts the tail whenever the view's filters change, and marshals every
//! line onto the UI task through a sink channel.

mod buffer;
mod controller;
mod error;
mod process;
mod registry;
mod sink;
mod worker;

pub use buffer::LogBuffer;
pub use controller::{ClockAnswer, ClockQuery, ClockTicket, StreamController};
pub use error::StreamError;
pub use process::LogProcess;
pub use registry::{StreamRegistry, Terminate};
pub use sink::{LogSink, SinkEvent};
pub use worker::{LogStreamWorker, StreamBounds, WorkerHandle, WorkerId, log_args};

// Re-export types used in our public API
pub use nanowhale_types::{FilterState, LineKind, LogEntry, RestartMode, Timestamp, WorkerState};
