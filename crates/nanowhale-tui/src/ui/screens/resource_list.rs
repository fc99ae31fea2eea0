use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    app::AppState,
    ui::{
        Layout, Theme,
        components::{ListSelector, ListSelectorExt, StatusBar, list_nav_hints},
    },
};
use nanowhale_types::ResourceKind;

/// Container, image and volume lists, one category at a time
pub struct ResourceListScreen;

impl ResourceListScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let Some(kind) = state.current_kind() else {
            return;
        };

        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        Self::render_header(frame, header_area, kind);
        Self::render_list(frame, content_area, state, kind);
        Self::render_status_bar(frame, status_area, state, kind);
    }

    fn render_header(frame: &mut Frame, area: Rect, active: ResourceKind) {
        let mut spans = vec![Span::styled("nanowhale", Theme::title())];
        for kind in ResourceKind::ALL {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            let style = if kind == active {
                Theme::text_highlight()
            } else {
                Theme::text_dim()
            };
            spans.push(Span::styled(kind.label(), style));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_list(frame: &mut Frame, area: Rect, state: &mut AppState, kind: ResourceKind) {
        let list_area = Layout::centered_list(area, 80);
        let items = list_items(state, kind);
        let title = match kind {
            ResourceKind::Containers => " Containers ",
            ResourceKind::Images => " Images ",
            ResourceKind::Volumes => " Volumes ",
        };

        let selector = ListSelector::new(title).items(items);

        frame.render_list_selector(list_area, selector, &mut state.ui_state.list_state);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, kind: ResourceKind) {
        if let Some(command) = &state.ui_state.pending_command {
            let prompt = StatusBar::new()
                .hints([("y", "Yes"), ("n", "No")])
                .right_styled(command.prompt(), Theme::text_highlight());
            frame.render_widget(prompt, area);
            return;
        }

        let status = StatusBar::new().hints(list_nav_hints(kind));
        let status = match &state.ui_state.error_message {
            Some(message) => status.right_styled(message.clone(), Theme::error()),
            None => status.right(summary(state, kind)),
        };

        frame.render_widget(status, area);
    }
}

/// One line per resource; running containers and tagged images are highlighted
fn list_items(state: &AppState, kind: ResourceKind) -> Vec<(String, bool)> {
    match kind {
        ResourceKind::Containers => state
            .containers
            .iter()
            .map(|container| {
                let display = format!(
                    "{:<24} {}  {}  ({})",
                    container.display_name(),
                    container.short_id(),
                    container.image,
                    container.status
                );
                (display, container.is_running())
            })
            .collect(),
        ResourceKind::Images => state
            .images
            .iter()
            .map(|image| {
                let display = format!(
                    "{:<40} {}  {}",
                    image.reference(),
                    image.short_id(),
                    image.size
                );
                (display, !image.is_dangling())
            })
            .collect(),
        ResourceKind::Volumes => state
            .volumes
            .iter()
            .map(|volume| (format!("{:<48} {}", volume.name, volume.driver), false))
            .collect(),
    }
}

fn summary(state: &AppState, kind: ResourceKind) -> String {
    match kind {
        ResourceKind::Containers => {
            let running = state.containers.iter().filter(|c| c.is_running()).count();
            format!("{} containers, {} running", state.containers.len(), running)
        }
        ResourceKind::Images => {
            let dangling = state.images.iter().filter(|i| i.is_dangling()).count();
            format!("{} images, {} dangling", state.images.len(), dangling)
        }
        ResourceKind::Volumes => format!("{} volumes", state.volumes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanowhale_types::{ContainerInfo, ImageInfo};
    use tokio::sync::mpsc;

    #[test]
    fn test_items_and_summary_per_kind() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = AppState::new(tx);
        state.containers = vec![ContainerInfo {
            state: "running".to_string(),
            ..ContainerInfo::new("0123456789abcdef".to_string(), "web".to_string())
        }];
        state.images = vec![ImageInfo {
            id: "sha256:0123456789abcdef".to_string(),
            repository: "<none>".to_string(),
            tag: "<none>".to_string(),
            size: "5MB".to_string(),
        }];

        let containers = list_items(&state, ResourceKind::Containers);
        assert!(containers[0].0.starts_with("web"));
        assert!(containers[0].1);
        assert_eq!(summary(&state, ResourceKind::Containers), "1 containers, 1 running");

        let images = list_items(&state, ResourceKind::Images);
        assert!(images[0].0.contains("0123456789ab"));
        assert!(!images[0].1);
        assert_eq!(summary(&state, ResourceKind::Images), "1 images, 1 dangling");

        assert!(list_items(&state, ResourceKind::Volumes).is_empty());
    }
}
