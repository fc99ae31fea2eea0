//! Shared types for nanowhale
//!
//! This crate contains data structures used across multiple nanowhale crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use ratatui::style::Color;
use serde::Deserialize;

// ============================================================================
// Engine Resource Types
// ============================================================================

/// A container as reported by `ps --format {{json .}}`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ContainerInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

impl ContainerInfo {
    pub fn new(id: String, names: String) -> Self {
        Self {
            id,
            names,
            ..Default::default()
        }
    }

    /// First 12 characters of the id, the way the engine prints it
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(12) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// Human readable name, falling back to the short id
    pub fn display_name(&self) -> &str {
        if self.names.is_empty() {
            self.short_id()
        } else {
            &self.names
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running") || self.status.starts_with("Up")
    }
}

/// An image as reported by `images --format {{json .}}`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ImageInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Repository", default)]
    pub repository: String,
    #[serde(rename = "Tag", default)]
    pub tag: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

impl ImageInfo {
    /// Id without its `sha256:` prefix, cut to 12 characters
    pub fn short_id(&self) -> &str {
        let id = self.id.strip_prefix("sha256:").unwrap_or(&self.id);
        match id.char_indices().nth(12) {
            Some((idx, _)) => &id[..idx],
            None => id,
        }
    }

    /// Untagged leftovers of a rebuild, removed by an image prune
    pub fn is_dangling(&self) -> bool {
        self.repository == "<none>" && self.tag == "<none>"
    }

    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// A volume as reported by `volume ls --format {{json .}}`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct VolumeInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver", default)]
    pub driver: String,
}

/// The resource lists the selection screens cycle through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    #[default]
    Containers,
    Images,
    Volumes,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Containers, Self::Images, Self::Volumes];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Containers => "Containers",
            Self::Images => "Images",
            Self::Volumes => "Volumes",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Containers => Self::Images,
            Self::Images => Self::Volumes,
            Self::Volumes => Self::Containers,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Containers => Self::Volumes,
            Self::Images => Self::Containers,
            Self::Volumes => Self::Images,
        }
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// A UTC instant used as a `--since`/`--until` bound.
///
/// Renders as RFC3339 with a literal `Z` and the shortest lossless fraction,
/// so engine-produced nanosecond stamps and hand-typed second stamps both
/// print back exactly as they were given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    /// Accepts RFC3339 (any offset), or `YYYY-MM-DD[ T]HH:MM:SS` / `YYYY-MM-DD` read as UTC
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let rfc_err = match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => return Ok(Self(dt.with_timezone(&Utc))),
            Err(e) => e,
        };

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(naive.and_utc()));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self(date.and_time(NaiveTime::MIN).and_utc()));
        }

        Err(rfc_err)
    }
}

// ============================================================================
// Stream Types
// ============================================================================

/// Filter controls of a log view. Owned by the UI, read at each restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterState {
    /// Pass `--timestamps` to the engine
    pub show_timestamps: bool,

    /// User-entered lower bound (used by range restarts)
    pub since: Option<Timestamp>,

    /// User-entered upper bound (used by range restarts)
    pub until: Option<Timestamp>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            since: None,
            until: None,
        }
    }
}

impl FilterState {
    pub fn has_range(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }
}

/// Why a log stream is being restarted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartMode {
    /// Use the explicit user-entered bounds
    Range,
    /// Unbounded: the whole log from the beginning, followed
    History,
    /// Blank the view and follow from the engine's current time
    Clear,
    /// Only the timestamp flag changed; bounds are inherited and the view is kept
    TimestampToggle,
}

impl RestartMode {
    /// Whether this restart wipes the log view before starting the new stream
    pub fn clears_view(&self) -> bool {
        !matches!(self, Self::TimestampToggle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::History => "history",
            Self::Clear => "clear",
            Self::TimestampToggle => "timestamp_toggle",
        }
    }
}

/// Lifecycle of a single log stream worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Starting,
    Streaming,
    EndedNaturally,
    Terminated,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndedNaturally | Self::Terminated | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::EndedNaturally => "ended",
            Self::Terminated => "stopped",
            Self::Failed => "failed",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Starting => Color::Yellow,
            Self::Streaming => Color::Green,
            Self::EndedNaturally => Color::Cyan,
            Self::Terminated => Color::DarkGray,
            Self::Failed => Color::Red,
        }
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// What produced a line in the log view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LineKind {
    /// Output of the log process
    #[default]
    Output,
    /// Informational marker written by the stream layer
    Notice,
    /// Failure marker written by the stream layer
    Error,
}

impl LineKind {
    pub fn color(&self) -> Color {
        match self {
            Self::Output => Color::White,
            Self::Notice => Color::Cyan,
            Self::Error => Color::Red,
        }
    }
}

/// A single line in the log view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Unique sequential ID
    pub id: u64,

    pub kind: LineKind,

    /// Line exactly as received
    pub raw: String,

    /// Engine timestamp prefix (present when streaming with `--timestamps`)
    pub timestamp: Option<DateTime<Utc>>,

    /// Byte offset in `raw` where the message starts (after the timestamp)
    message_start: usize,
}

impl LogEntry {
    /// Entry for a line of process output. `stamped` lines came from a
    /// stream started with `--timestamps`; only those have a leading RFC3339
    /// stamp split off.
    pub fn output(raw: String, stamped: bool) -> Self {
        let split = raw
            .split_once(' ')
            .filter(|_| stamped)
            .and_then(|(head, _)| {
                DateTime::parse_from_rfc3339(head)
                    .ok()
                    .map(|ts| (ts.with_timezone(&Utc), head.len() + 1))
            });
        let (timestamp, message_start) = match split {
            Some((ts, start)) => (Some(ts), start),
            None => (None, 0),
        };

        Self {
            id: 0,
            kind: LineKind::Output,
            raw,
            timestamp,
            message_start,
        }
    }

    pub fn marker(kind: LineKind, raw: String) -> Self {
        Self {
            id: 0,
            kind,
            raw,
            timestamp: None,
            message_start: 0,
        }
    }

    /// The line without its timestamp prefix
    pub fn message(&self) -> &str {
        &self.raw[self.message_start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_keeps_engine_precision() {
        let ts: Timestamp = "2024-03-01T12:00:00.123456789Z".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-03-01T12:00:00.123456789Z");

        let ts: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_timestamp_normalises_offsets_and_short_forms() {
        let ts: Timestamp = "2024-01-01T02:00:00+02:00".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-01T00:00:00Z");

        let ts: Timestamp = "2024-01-02 08:30:00".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02T08:30:00Z");

        let ts: Timestamp = "2024-01-02".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02T00:00:00Z");

        assert!("yesterday".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_output_entry_splits_timestamp() {
        let entry = LogEntry::output("2024-03-01T12:00:00.5Z hello world".to_string(), true);
        assert!(entry.timestamp.is_some());
        assert_eq!(entry.message(), "hello world");

        let entry = LogEntry::output("plain line".to_string(), true);
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.message(), "plain line");
    }

    #[test]
    fn test_unstamped_output_keeps_leading_date() {
        // the application itself logged an RFC3339 token first
        let raw = "2024-03-01T12:00:00Z job started".to_string();
        let entry = LogEntry::output(raw.clone(), false);
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.message(), raw);
    }

    #[test]
    fn test_restart_mode_clears_view() {
        assert!(RestartMode::Range.clears_view());
        assert!(RestartMode::History.clears_view());
        assert!(RestartMode::Clear.clears_view());
        assert!(!RestartMode::TimestampToggle.clears_view());
    }

    #[test]
    fn test_image_short_id_and_dangling() {
        let image = ImageInfo {
            id: "sha256:0123456789abcdef".to_string(),
            repository: "<none>".to_string(),
            tag: "<none>".to_string(),
            size: "1.2GB".to_string(),
        };
        assert_eq!(image.short_id(), "0123456789ab");
        assert!(image.is_dangling());
    }

    #[test]
    fn test_resource_kind_cycles() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.next().prev(), kind);
        }
        assert_eq!(ResourceKind::Volumes.next(), ResourceKind::Containers);
    }

    #[test]
    fn test_container_short_id() {
        let c = ContainerInfo::new("0123456789abcdef".to_string(), String::new());
        assert_eq!(c.short_id(), "0123456789ab");
        assert_eq!(c.display_name(), "0123456789ab");
    }
}
