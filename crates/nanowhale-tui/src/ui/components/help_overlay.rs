use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Help overlay showing keybindings
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame) {
        let area = frame.area();

        // Center the help popup
        let popup_width = 60.min(area.width.saturating_sub(4));
        let popup_height = 42.min(area.height.saturating_sub(4));

        let x = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let y = area.y + (area.height.saturating_sub(popup_height)) / 2;
        let popup_area = Rect::new(x, y, popup_width, popup_height);

        // Clear the background
        frame.render_widget(Clear, popup_area);

        let help_text = vec![
            Line::from(Span::styled(
                "Keybindings",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Self::section("Resource lists"),
            Self::key_line("Tab", "Next list (containers, images, volumes)"),
            Self::key_line("Enter", "Open container logs"),
            Self::key_line("s/S/R", "Start / stop / restart container"),
            Self::key_line("D", "Remove selected (asks first)"),
            Self::key_line("P", "Prune the list (asks first)"),
            Self::key_line("r", "Refresh"),
            Line::from(""),
            Self::section("Log navigation"),
            Self::key_line("j/↓", "Scroll down"),
            Self::key_line("k/↑", "Scroll up"),
            Self::key_line("Ctrl+d", "Page down"),
            Self::key_line("Ctrl+u", "Page up"),
            Self::key_line("g", "Go to top"),
            Self::key_line("G", "Go to bottom"),
            Self::key_line("f", "Toggle follow mode"),
            Line::from(""),
            Self::section("Stream"),
            Self::key_line("t", "Toggle engine timestamps"),
            Self::key_line("T", "Show UTC / local time"),
            Self::key_line("h", "Show full history"),
            Self::key_line("c", "Clear and follow from now"),
            Self::key_line("r", "Enter a time range"),
            Self::key_line("x", "Forget the entered range"),
            Line::from(""),
            Self::section("Range input"),
            Self::key_line("Tab", "Switch From / To"),
            Self::key_line("Enter", "Apply range"),
            Self::key_line("Esc", "Cancel"),
            Line::from(""),
            Self::section("Actions"),
            Self::key_line("e", "Export logs to file"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("Esc", "Go back"),
            Self::key_line("q", "Quit"),
        ];

        let help_widget = Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Help ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

        frame.render_widget(help_widget, popup_area);
    }

    fn section(title: &str) -> Line<'_> {
        Line::from(Span::styled(title, Style::default().fg(Color::Yellow)))
    }

    fn key_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
        Line::from(vec![
            Span::styled(format!("  {:>8}", key), Style::default().fg(Color::Green)),
            Span::styled(format!("  {}", desc), Style::default().fg(Color::White)),
        ])
    }
}
