use tokio::sync::mpsc;

use nanowhale_types::LineKind;

/// A mutation of the log view, applied on the UI task in submission order.
///
/// `epoch` orders clears against appends: an append created under an older
/// epoch than the last applied clear is dropped by [`crate::LogBuffer`].
/// `stamped` is set on output of a stream started with `--timestamps`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Append {
        epoch: u64,
        kind: LineKind,
        stamped: bool,
        line: String,
    },
    Clear {
        epoch: u64,
    },
}

/// Sending half of the log view.
///
/// Background tasks never touch the view directly; they post events here and
/// the event loop drains them into the buffer.
#[derive(Clone, Debug)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl LogSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiver the UI task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn append(&self, epoch: u64, stamped: bool, line: String) {
        self.send(SinkEvent::Append {
            epoch,
            kind: LineKind::Output,
            stamped,
            line,
        });
    }

    pub fn notice(&self, epoch: u64, line: String) {
        self.send(SinkEvent::Append {
            epoch,
            kind: LineKind::Notice,
            stamped: false,
            line,
        });
    }

    pub fn error(&self, epoch: u64, line: String) {
        self.send(SinkEvent::Append {
            epoch,
            kind: LineKind::Error,
            stamped: false,
            line,
        });
    }

    pub fn clear(&self, epoch: u64) {
        self.send(SinkEvent::Clear { epoch });
    }

    fn send(&self, event: SinkEvent) {
        // A closed receiver means the view is gone; nothing left to update
        let _ = self.tx.send(event);
    }
}
