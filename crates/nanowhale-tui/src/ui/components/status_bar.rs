use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

use crate::ui::Theme;
use nanowhale_types::ResourceKind;

/// Status bar showing keyboard shortcuts
pub struct StatusBar<'a> {
    hints: Vec<(&'a str, &'a str)>,
    right: Vec<Span<'a>>,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            hints: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Append text to display on the right side
    pub fn right<S: Into<String>>(self, text: S) -> Self {
        self.right_styled(text, Theme::status_bar())
    }

    /// Append styled text to display on the right side
    pub fn right_styled<S: Into<String>>(mut self, text: S, style: Style) -> Self {
        if !self.right.is_empty() {
            self.right.push(Span::styled(" │ ", Theme::status_bar()));
        }
        self.right.push(Span::styled(text.into(), style));
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        buf.set_style(area, Theme::status_bar());

        // Build hints
        let mut spans = Vec::new();
        for (i, (key, desc)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", Theme::status_bar()));
            }
            spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
            spans.push(Span::styled(format!(" {}", desc), Theme::status_bar()));
        }

        let line = Line::from(spans);
        let line_width = line.width() as u16;

        // Render hints on the left
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));

        // Render right text if present and there is room for it
        if !self.right.is_empty() {
            let right = Line::from(self.right);
            let right_width = right.width() as u16;
            let right_x = area.x + area.width.saturating_sub(right_width + 2);
            if right_x > area.x + line_width + 2 {
                buf.set_line(right_x, area.y, &right, right_width);
            }
        }
    }
}

/// Hints for a resource list screen
pub fn list_nav_hints(kind: ResourceKind) -> Vec<(&'static str, &'static str)> {
    let mut hints = vec![("↑/k", "Up"), ("↓/j", "Down")];
    if kind == ResourceKind::Containers {
        hints.extend([("Enter", "Logs"), ("s/S/R", "Start/Stop/Restart")]);
    }
    hints.extend([
        ("D", "Remove"),
        ("P", "Prune"),
        ("Tab", "Next list"),
        ("r", "Refresh"),
        ("q", "Quit"),
    ]);
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, width: u16) -> String {
        (0..width).map(|x| buf[(x, 0)].symbol()).collect()
    }

    #[test]
    fn test_renders_hints_and_right_text() {
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);

        StatusBar::new()
            .hints([("q", "Quit")])
            .right("streaming")
            .right("42 lines")
            .render(area, &mut buf);

        let text = row(&buf, 60);
        assert!(text.contains("[q] Quit"));
        assert!(text.contains("streaming │ 42 lines"));
    }

    #[test]
    fn test_drops_right_text_when_it_does_not_fit() {
        let area = Rect::new(0, 0, 20, 1);
        let mut buf = Buffer::empty(area);

        StatusBar::new()
            .hints([("Esc", "Back")])
            .right("a very long status message")
            .render(area, &mut buf);

        let text = row(&buf, 20);
        assert!(text.contains("[Esc] Back"));
        assert!(!text.contains("status"));
    }

    #[test]
    fn test_lifecycle_hints_only_on_containers() {
        let has_lifecycle =
            |kind| list_nav_hints(kind).iter().any(|(key, _)| *key == "s/S/R");
        assert!(has_lifecycle(ResourceKind::Containers));
        assert!(!has_lifecycle(ResourceKind::Images));
        assert!(!has_lifecycle(ResourceKind::Volumes));
    }
}
