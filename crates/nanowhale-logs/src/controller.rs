use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::registry::StreamRegistry;
use crate::sink::LogSink;
use crate::worker::{LogStreamWorker, StreamBounds, WorkerHandle};
use nanowhale_engine::{EngineClient, EngineError};
use nanowhale_types::{FilterState, RestartMode, Timestamp};

static NEXT_CLOCK_TICKET: AtomicU64 = AtomicU64::new(1);

/// Identifies one clock query across every controller in the process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockTicket(u64);

impl ClockTicket {
    fn next() -> Self {
        Self(NEXT_CLOCK_TICKET.fetch_add(1, Ordering::Relaxed))
    }
}

/// An engine clock query a (re)start is waiting on.
///
/// Run it off the UI task and hand the answer to [`StreamController::resolve`].
#[derive(Debug)]
pub struct ClockQuery {
    ticket: ClockTicket,
    engine: EngineClient,
}

impl ClockQuery {
    pub fn ticket(&self) -> ClockTicket {
        self.ticket
    }

    pub async fn run(self) -> ClockAnswer {
        ClockAnswer {
            ticket: self.ticket,
            now: self.engine.current_time().await,
        }
    }
}

/// Result of a [`ClockQuery`]
#[derive(Debug)]
pub struct ClockAnswer {
    ticket: ClockTicket,
    now: Result<Timestamp, EngineError>,
}

impl ClockAnswer {
    pub fn ticket(&self) -> ClockTicket {
        self.ticket
    }
}

/// A start deferred until the engine clock answers
#[derive(Clone, Copy, Debug)]
struct PendingStart {
    ticket: ClockTicket,
    mode: Option<RestartMode>,
    show_timestamps: bool,
}

/// Owns the log stream of one log view.
///
/// Every filter change replaces the current worker with a fresh one; the old
/// worker is told to stop and removes itself from the registry when its task
/// ends, which may happen after the replacement is already registered.
///
/// Starts that follow from the engine's "now" are split in two: the
/// controller stops the old worker and clears the view right away, returns a
/// [`ClockQuery`], and starts the new worker once the answer comes back. Only
/// the answer to the latest query is acted on.
pub struct StreamController {
    target: String,
    engine: EngineClient,
    sink: LogSink,
    registry: StreamRegistry,
    current: Option<WorkerHandle>,
    pending: Option<PendingStart>,
    /// Bumped on every clear; tags what each worker writes
    epoch: u64,
}

impl StreamController {
    pub fn new(engine: EngineClient, sink: LogSink, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            engine,
            sink,
            registry: StreamRegistry::new(),
            current: None,
            pending: None,
            epoch: 0,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The worker started by the last successful (re)start, if any
    pub fn current(&self) -> Option<&WorkerHandle> {
        self.current.as_ref()
    }

    /// Whether a start is waiting on the engine clock
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Begin the first stream of the view. It follows from the engine's
    /// current time so a long-lived container does not dump its backlog.
    pub fn open(&mut self, filter: &FilterState) -> ClockQuery {
        self.stop_current();
        self.defer(None, filter.show_timestamps)
    }

    /// Replace the current stream after a filter change.
    ///
    /// The old worker is stopped and, for clearing modes, the view is wiped
    /// before this returns. Modes whose bounds are already known start the
    /// new worker immediately; the others return the clock query to run.
    pub fn restart(&mut self, mode: RestartMode, filter: &FilterState) -> Option<ClockQuery> {
        let show_timestamps = filter.show_timestamps;
        let previous = self.stop_current();

        if mode.clears_view() {
            self.epoch += 1;
            self.sink.clear(self.epoch);
        }

        let bounds = match (mode, &previous) {
            (RestartMode::Range, _) => StreamBounds::new(filter.since, filter.until),
            (RestartMode::History, _) => StreamBounds::default(),
            (RestartMode::TimestampToggle, Some(previous)) => previous.bounds(),
            // a toggle with nothing to inherit from starts like a fresh view
            (RestartMode::Clear | RestartMode::TimestampToggle, _) => {
                return Some(self.defer(Some(mode), show_timestamps));
            }
        };

        self.start(Some(mode), bounds, show_timestamps);
        None
    }

    /// Act on a clock answer. Answers to superseded queries are ignored and
    /// `false` is returned.
    ///
    /// A failed query leaves the view without a stream and one error line;
    /// any clear that came with the restart has already happened.
    pub fn resolve(&mut self, answer: ClockAnswer) -> bool {
        let pending = match self.pending {
            Some(pending) if pending.ticket == answer.ticket => pending,
            _ => {
                debug!(container = %self.target, ticket = ?answer.ticket, "stale clock answer ignored");
                return false;
            }
        };
        self.pending = None;

        match answer.now {
            Ok(now) => self.start(
                pending.mode,
                StreamBounds::new(Some(now), None),
                pending.show_timestamps,
            ),
            Err(e) => self.report_time_failure(e.into()),
        }
        true
    }

    /// Tear down the view: stop every worker still registered and forget any
    /// start waiting on the clock. Returns how many workers were asked to stop.
    pub fn shutdown(&mut self) -> usize {
        self.current = None;
        self.pending = None;
        self.registry.terminate_all()
    }

    /// Stop the current worker and supersede any pending start
    fn stop_current(&mut self) -> Option<WorkerHandle> {
        self.pending = None;
        let previous = self.current.take();
        if let Some(previous) = &previous {
            previous.terminate();
        }
        previous
    }

    fn defer(&mut self, mode: Option<RestartMode>, show_timestamps: bool) -> ClockQuery {
        let ticket = ClockTicket::next();
        self.pending = Some(PendingStart {
            ticket,
            mode,
            show_timestamps,
        });
        ClockQuery {
            ticket,
            engine: self.engine.clone(),
        }
    }

    fn start(&mut self, mode: Option<RestartMode>, bounds: StreamBounds, show_timestamps: bool) {
        info!(
            container = %self.target,
            mode = mode.map_or("open", |m| m.label()),
            since = ?bounds.since.map(|t| t.to_string()),
            until = ?bounds.until.map(|t| t.to_string()),
            show_timestamps,
            "starting log stream"
        );

        let registry = self.registry.clone();
        let worker = LogStreamWorker::new(
            self.engine.clone(),
            self.sink.clone(),
            self.epoch,
            self.target.clone(),
            bounds,
            show_timestamps,
            move |id| {
                registry.remove(id);
            },
        );

        // Register before the task exists so its removal can never run first
        let handle = worker.handle();
        self.registry.insert(handle.id(), handle.clone());
        worker.start();

        self.current = Some(handle);
    }

    fn report_time_failure(&self, error: StreamError) {
        warn!(container = %self.target, %error, "log stream not started");
        self.sink.error(
            self.epoch,
            "--- ERROR: Could not fetch time. Stream failed. ---".to_string(),
        );
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
