use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::sink::SinkEvent;
use nanowhale_types::{LineKind, LogEntry};

/// Ring buffer backing the log view
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    entries: Arc<RwLock<VecDeque<LogEntry>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next entry ID
    next_id: Arc<AtomicU64>,

    /// Epoch of the last applied clear
    epoch: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Apply a sink event. Returns false if the event was stale and dropped.
    pub fn apply(&self, event: SinkEvent) -> bool {
        match event {
            SinkEvent::Append {
                epoch,
                kind,
                stamped,
                line,
            } => {
                if epoch < self.epoch.load(Ordering::SeqCst) {
                    return false;
                }
                let entry = match kind {
                    LineKind::Output => LogEntry::output(line, stamped),
                    marker => LogEntry::marker(marker, line),
                };
                self.push(entry);
                true
            }
            SinkEvent::Clear { epoch } => {
                self.epoch.fetch_max(epoch, Ordering::SeqCst);
                self.clear();
                true
            }
        }
    }

    /// Push a new entry, evicting oldest if at capacity
    pub fn push(&self, mut entry: LogEntry) {
        entry.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Get all entries (cloned for rendering)
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Get entries in a range (for virtual scrolling)
    pub fn range(&self, start: usize, count: usize) -> Vec<LogEntry> {
        let entries = self.entries.read();
        entries.iter().skip(start).take(count).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(epoch: u64, line: &str) -> SinkEvent {
        SinkEvent::Append {
            epoch,
            kind: LineKind::Output,
            stamped: false,
            line: line.to_string(),
        }
    }

    fn raw_lines(buffer: &LogBuffer) -> Vec<String> {
        buffer.all().into_iter().map(|e| e.raw).collect()
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let buffer = LogBuffer::new(2);
        for line in ["a", "b", "c"] {
            buffer.apply(append(0, line));
        }
        assert_eq!(raw_lines(&buffer), vec!["b", "c"]);
    }

    #[test]
    fn test_clear_drops_appends_from_older_epochs() {
        let buffer = LogBuffer::new(10);
        buffer.apply(append(0, "old"));
        buffer.apply(SinkEvent::Clear { epoch: 1 });
        assert!(buffer.is_empty());

        // a predecessor's line that was still in flight when the clear landed
        assert!(!buffer.apply(append(0, "late")));
        assert!(buffer.apply(append(1, "new")));
        assert_eq!(raw_lines(&buffer), vec!["new"]);
    }

    #[test]
    fn test_markers_keep_their_kind() {
        let buffer = LogBuffer::new(10);
        buffer.apply(SinkEvent::Append {
            epoch: 0,
            kind: LineKind::Error,
            stamped: false,
            line: "--- ERROR: boom ---".to_string(),
        });
        let entries = buffer.all();
        assert_eq!(entries[0].kind, LineKind::Error);
        assert_eq!(entries[0].message(), "--- ERROR: boom ---");
    }

    #[test]
    fn test_stamp_split_follows_stream_flag() {
        let buffer = LogBuffer::new(10);
        for stamped in [true, false] {
            buffer.apply(SinkEvent::Append {
                epoch: 0,
                kind: LineKind::Output,
                stamped,
                line: "2024-03-01T12:00:00Z ready".to_string(),
            });
        }

        let entries = buffer.all();
        assert_eq!(entries[0].message(), "ready");
        assert_eq!(entries[1].message(), "2024-03-01T12:00:00Z ready");
        assert!(entries[1].timestamp.is_none());
    }

    #[test]
    fn test_range_for_scrolling() {
        let buffer = LogBuffer::new(10);
        for line in ["a", "b", "c", "d"] {
            buffer.apply(append(0, line));
        }
        let window: Vec<_> = buffer.range(1, 2).into_iter().map(|e| e.raw).collect();
        assert_eq!(window, vec!["b", "c"]);
    }
}
