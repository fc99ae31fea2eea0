use chrono::{DateTime, Local, Utc};
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use crate::app::{AppState, RangeField};
use crate::ui::{Layout, Theme};
use nanowhale_logs::{LineKind, LogBuffer, LogEntry, StreamBounds, WorkerState};

/// Log viewer screen
pub struct LogViewerScreen;

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, log_buffer: &LogBuffer) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);
        let (range_area, logs_area) = Layout::log_viewer(content_area, state.ui_state.range_input_active);

        Self::render_header(frame, header_area, state);
        if let Some(range_area) = range_area {
            Self::render_range_bar(frame, range_area, state);
        }
        Self::render_logs(frame, logs_area, state, log_buffer);
        Self::render_status_bar(frame, status_area, state, log_buffer);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let (name, id) = state
            .selected_container
            .as_ref()
            .map(|c| (c.display_name(), c.short_id()))
            .unwrap_or(("?", "?"));

        let mut spans = vec![
            Span::styled("nanowhale", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(name, Theme::text_highlight()),
            Span::styled(format!(" ({id})"), Theme::text_dim()),
            Span::styled(" │ ", Theme::text_dim()),
        ];

        match &state.stream {
            Some(stream) => {
                let bounds = stream.bounds();
                spans.push(Span::styled(bounds_label(&bounds), Theme::text()));
                spans.push(Span::styled(" │ ", Theme::text_dim()));
                spans.push(Span::styled(
                    if bounds.follows() { "following" } else { "bounded" },
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            None if state.stream_pending => {
                spans.push(Span::styled("asking engine for the time", Theme::text_dim()));
            }
            None => spans.push(Span::styled("no stream", Theme::error())),
        }

        if !state.ui_state.filter.show_timestamps {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            spans.push(Span::styled("no timestamps", Theme::text_dim()));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_range_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let ui = &state.ui_state;
        let mut spans = Vec::new();

        for (field, label, input) in [
            (RangeField::Since, " From: ", &ui.since_input),
            (RangeField::Until, "  To: ", &ui.until_input),
        ] {
            let active = ui.range_field == field;
            spans.push(Span::styled(
                label,
                if active { Theme::text_highlight() } else { Theme::text_dim() },
            ));
            spans.push(Span::styled(input.clone(), Theme::text()));
            if active {
                spans.push(Span::styled(
                    "█",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::SLOW_BLINK),
                ));
            }
        }

        if let Some(err) = &ui.range_error {
            spans.push(Span::styled(format!("  ⚠ {err}"), Style::default().fg(Color::Red)));
        } else {
            spans.push(Span::styled(
                "  [Tab] Switch  [Enter] Apply  [Esc] Cancel",
                Theme::text_dim(),
            ));
        }

        let range_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if ui.range_error.is_some() {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Yellow)
                })
                .title(Span::styled(" Time Range (RFC3339 or YYYY-MM-DD [HH:MM:SS]) ", Theme::title())),
        );

        frame.render_widget(range_bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, log_buffer: &LogBuffer) {
        let total_logs = log_buffer.len();

        // Calculate visible area (accounting for border)
        let inner_height = area.height.saturating_sub(2) as usize;
        let max_scroll = total_logs.saturating_sub(inner_height);

        // Auto-scroll: if at bottom, stay at bottom
        if state.ui_state.auto_scroll {
            state.ui_state.log_scroll = max_scroll;
        }

        // Clamp scroll position
        if state.ui_state.log_scroll > max_scroll {
            state.ui_state.log_scroll = max_scroll;
        }

        let local = state.ui_state.use_local_time;
        let lines: Vec<Line> = log_buffer
            .range(state.ui_state.log_scroll, inner_height)
            .iter()
            .map(|entry| format_log_line(entry, local))
            .collect();

        let title = format!(
            " Logs ({}) {} ",
            total_logs,
            if local { "local" } else { "UTC" }
        );

        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        if total_logs > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(state.ui_state.log_scroll);

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, log_buffer: &LogBuffer) {
        let mut spans = vec![Span::styled(" ", Theme::status_bar())];
        for (key, desc) in [
            ("t", "Stamps"),
            ("h", "History"),
            ("c", "Clear"),
            ("r", "Range"),
            ("e", "Export"),
            ("?", "Help"),
            ("Esc", "Back"),
        ] {
            spans.push(Span::styled("[", Theme::status_bar()));
            spans.push(Span::styled(key, Theme::status_bar_key()));
            spans.push(Span::styled(format!("]{desc} "), Theme::status_bar()));
        }

        let mut right = Vec::new();
        if let Some(message) = &state.ui_state.error_message {
            right.push(Span::styled(
                message.clone(),
                Theme::status_bar().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
            right.push(Span::styled(" │ ", Theme::status_bar()));
        }
        match &state.stream {
            Some(stream) => {
                let worker_state = stream.state();
                right.push(Span::styled(worker_state.label(), Theme::worker_state(worker_state)));
            }
            None if state.stream_pending => right.push(Span::styled(
                WorkerState::Starting.label(),
                Theme::worker_state(WorkerState::Starting),
            )),
            None => right.push(Span::styled("idle", Theme::status_bar())),
        }
        right.push(Span::styled(
            format!(
                " │ {} lines {} ",
                log_buffer.len(),
                if state.ui_state.auto_scroll { "▼" } else { " " }
            ),
            Theme::status_bar(),
        ));

        // Pad between hints and the right side
        let left_width: usize = spans.iter().map(|s| s.width()).sum();
        let right_width: usize = right.iter().map(|s| s.width()).sum();
        let padding = (area.width as usize).saturating_sub(left_width + right_width);

        spans.push(Span::styled(" ".repeat(padding), Theme::status_bar()));
        spans.extend(right);

        let status = Paragraph::new(Line::from(spans)).style(Theme::status_bar());

        frame.render_widget(status, area);
    }
}

/// One buffered entry as a styled line: `  id  time  message`
fn format_log_line(entry: &LogEntry, local: bool) -> Line<'static> {
    let mut spans = vec![Span::styled(format!("{:>5} ", entry.id), Theme::text_dim())];

    if let Some(ts) = entry.timestamp {
        spans.push(Span::styled(
            format!("{} ", format_timestamp(ts, local)),
            Theme::text_dim(),
        ));
    }

    spans.push(Span::styled(entry.message().to_string(), Theme::log_line(entry.kind)));

    Line::from(spans)
}

/// Engine timestamps are UTC; the viewer can show them in either zone
fn format_timestamp(ts: DateTime<Utc>, local: bool) -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
    if local {
        ts.with_timezone(&Local).format(FORMAT).to_string()
    } else {
        ts.format(FORMAT).to_string()
    }
}

fn bounds_label(bounds: &StreamBounds) -> String {
    match (bounds.since, bounds.until) {
        (None, None) => "full history".to_string(),
        (Some(since), None) => format!("since {since}"),
        (None, Some(until)) => format!("until {until}"),
        (Some(since), Some(until)) => format!("{since} → {until}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_label() {
        let since = "2024-01-01T00:00:00Z".parse().ok();
        let until = "2024-01-02T00:00:00Z".parse().ok();

        assert_eq!(bounds_label(&StreamBounds::default()), "full history");
        assert_eq!(
            bounds_label(&StreamBounds::new(since, None)),
            "since 2024-01-01T00:00:00Z"
        );
        assert_eq!(
            bounds_label(&StreamBounds::new(since, until)),
            "2024-01-01T00:00:00Z → 2024-01-02T00:00:00Z"
        );
    }

    #[test]
    fn test_utc_timestamp_display() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(ts, false), "2024-03-01 12:00:00.123");
    }

    #[test]
    fn test_log_line_strips_engine_timestamp() {
        let entry = LogEntry::output("2024-03-01T12:00:00.5Z GET /health 200".to_string(), true);
        let line = format_log_line(&entry, false);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();

        assert_eq!(text, "    0 2024-03-01 12:00:00.500 GET /health 200");
    }

    #[test]
    fn test_marker_line_keeps_kind_style() {
        let entry = LogEntry::marker(LineKind::Error, "--- ERROR: boom ---".to_string());
        let line = format_log_line(&entry, true);

        let message = line.spans.last().unwrap();
        assert_eq!(message.content, "--- ERROR: boom ---");
        assert_eq!(message.style.fg, Some(Color::Red));
    }
}
