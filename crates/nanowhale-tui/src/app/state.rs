use ratatui::widgets::ListState;
use tokio::sync::mpsc;

use super::Action;
use nanowhale_engine::ResourceCommand;
use nanowhale_logs::WorkerHandle;
use nanowhale_types::{ContainerInfo, FilterState, ImageInfo, ResourceKind, Timestamp, VolumeInfo};

/// Screen enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    /// One of the resource lists
    Resources(ResourceKind),
    LogViewer,
}

/// Which bound the range input bar is editing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RangeField {
    #[default]
    Since,
    Until,
}

impl RangeField {
    pub fn other(self) -> Self {
        match self {
            Self::Since => Self::Until,
            Self::Until => Self::Since,
        }
    }
}

/// UI-specific transient state
pub struct UiState {
    /// Is help overlay visible?
    pub help_visible: bool,

    /// List state for selection screens
    pub list_state: ListState,

    /// Message to display in the status bar (if any)
    pub error_message: Option<String>,

    /// Destructive command waiting for a yes/no answer
    pub pending_command: Option<ResourceCommand>,

    // Log viewer specific state
    /// Scroll position in log viewer
    pub log_scroll: usize,

    /// Auto-scroll enabled (follow mode)?
    pub auto_scroll: bool,

    /// Show timestamps in local time (vs UTC)
    pub use_local_time: bool,

    /// Filter controls read by every stream restart
    pub filter: FilterState,

    /// Is the range input bar open?
    pub range_input_active: bool,

    /// Field the range input bar is editing
    pub range_field: RangeField,

    /// Text of the From field
    pub since_input: String,

    /// Text of the To field
    pub until_input: String,

    /// Why the last range apply was rejected
    pub range_error: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            help_visible: false,
            list_state: ListState::default(),
            error_message: None,
            pending_command: None,
            log_scroll: 0,
            auto_scroll: true,
            use_local_time: true,
            filter: FilterState::default(),
            range_input_active: false,
            range_field: RangeField::default(),
            since_input: String::new(),
            until_input: String::new(),
            range_error: None,
        }
    }
}

/// Global application state
pub struct AppState {
    /// Current screen being displayed
    pub current_screen: Screen,

    /// Navigation stack for back navigation
    pub screen_stack: Vec<Screen>,

    /// Containers known to the engine
    pub containers: Vec<ContainerInfo>,

    /// Images known to the engine
    pub images: Vec<ImageInfo>,

    /// Volumes known to the engine
    pub volumes: Vec<VolumeInfo>,

    /// Container whose log is being viewed
    pub selected_container: Option<ContainerInfo>,

    /// Worker currently feeding the log view
    pub stream: Option<WorkerHandle>,

    /// A stream start is waiting on the engine clock
    pub stream_pending: bool,

    /// UI state
    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,

    /// Channel sender for async actions
    pub action_tx: mpsc::UnboundedSender<Action>,
}

impl AppState {
    pub fn new(action_tx: mpsc::UnboundedSender<Action>) -> Self {
        let mut ui_state = UiState::default();
        ui_state.list_state.select(Some(0));

        Self {
            current_screen: Screen::Resources(ResourceKind::Containers),
            screen_stack: Vec::new(),
            containers: Vec::new(),
            images: Vec::new(),
            volumes: Vec::new(),
            selected_container: None,
            stream: None,
            stream_pending: false,
            ui_state,
            should_quit: false,
            action_tx,
        }
    }

    /// Navigate to a new screen, pushing current to stack
    pub fn navigate_to(&mut self, screen: Screen) {
        self.screen_stack.push(self.current_screen);
        self.current_screen = screen;
        self.ui_state.list_state.select(Some(0));
    }

    /// Go back to previous screen
    pub fn go_back(&mut self) -> bool {
        if let Some(prev_screen) = self.screen_stack.pop() {
            self.current_screen = prev_screen;
            self.ui_state.list_state.select(Some(0));
            true
        } else {
            false
        }
    }

    /// Resource list on screen, if any
    pub fn current_kind(&self) -> Option<ResourceKind> {
        match self.current_screen {
            Screen::Resources(kind) => Some(kind),
            Screen::LogViewer => None,
        }
    }

    /// Swap the resource list in place; the navigation stack is untouched
    pub fn switch_category(&mut self, kind: ResourceKind) {
        if self.current_kind().is_some() {
            self.current_screen = Screen::Resources(kind);
            self.ui_state.list_state.select(Some(0));
            self.ui_state.pending_command = None;
        }
    }

    /// Get the current list length based on screen
    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            Screen::Resources(ResourceKind::Containers) => self.containers.len(),
            Screen::Resources(ResourceKind::Images) => self.images.len(),
            Screen::Resources(ResourceKind::Volumes) => self.volumes.len(),
            Screen::LogViewer => 0,
        }
    }

    /// Keep the selection inside a list that was just reloaded
    pub fn clamp_selection(&mut self) {
        let len = self.current_list_len();
        if self.selected_index().is_none_or(|i| i >= len) {
            self.ui_state.list_state.select(Some(len.saturating_sub(1)));
        }
    }

    /// Move selection up
    pub fn list_up(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Move selection down
    pub fn list_down(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Get currently selected index
    pub fn selected_index(&self) -> Option<usize> {
        self.ui_state.list_state.selected()
    }

    /// The selected container, when the container list is on screen
    pub fn selected_container_in_list(&self) -> Option<&ContainerInfo> {
        match self.current_screen {
            Screen::Resources(ResourceKind::Containers) => {
                self.containers.get(self.selected_index()?)
            }
            _ => None,
        }
    }

    /// Management command an action stands for on the current list
    pub fn resource_command(&self, action: &Action) -> Option<ResourceCommand> {
        let kind = self.current_kind()?;
        let index = self.selected_index();

        match (kind, action) {
            (ResourceKind::Containers, Action::Prune) => Some(ResourceCommand::PruneContainers),
            (ResourceKind::Images, Action::Prune) => Some(ResourceCommand::PruneImages),
            (ResourceKind::Volumes, Action::Prune) => Some(ResourceCommand::PruneVolumes),
            (ResourceKind::Containers, _) => {
                let id = self.containers.get(index?)?.id.clone();
                match action {
                    Action::StartContainer => Some(ResourceCommand::StartContainer(id)),
                    Action::StopContainer => Some(ResourceCommand::StopContainer(id)),
                    Action::RestartContainer => Some(ResourceCommand::RestartContainer(id)),
                    Action::RemoveSelected => Some(ResourceCommand::RemoveContainer(id)),
                    _ => None,
                }
            }
            (ResourceKind::Images, Action::RemoveSelected) => {
                let id = self.images.get(index?)?.id.clone();
                Some(ResourceCommand::RemoveImage(id))
            }
            (ResourceKind::Volumes, Action::RemoveSelected) => {
                let name = self.volumes.get(index?)?.name.clone();
                Some(ResourceCommand::RemoveVolume(name))
            }
            _ => None,
        }
    }

    /// Queue a command for confirmation if it is destructive.
    /// Returns the command when it can run right away.
    pub fn request_command(&mut self, command: ResourceCommand) -> Option<ResourceCommand> {
        if command.is_destructive() {
            self.ui_state.pending_command = Some(command);
            None
        } else {
            Some(command)
        }
    }

    /// Accept the command waiting for confirmation
    pub fn confirm_command(&mut self) -> Option<ResourceCommand> {
        self.ui_state.pending_command.take()
    }

    pub fn cancel_command(&mut self) {
        self.ui_state.pending_command = None;
    }

    /// Look up a container by id, name or id prefix
    pub fn find_container(&self, target: &str) -> Option<&ContainerInfo> {
        self.containers
            .iter()
            .find(|c| c.id == target || c.names == target)
            .or_else(|| self.containers.iter().find(|c| c.id.starts_with(target)))
    }

    /// Show an error message
    pub fn show_error(&mut self, msg: String) {
        self.ui_state.error_message = Some(msg);
    }

    /// Dismiss the error message
    pub fn dismiss_error(&mut self) {
        self.ui_state.error_message = None;
    }

    /// Reset the per-container log view before opening a new one
    pub fn reset_log_view(&mut self) {
        self.ui_state.log_scroll = 0;
        self.ui_state.auto_scroll = true;
        self.ui_state.filter.since = None;
        self.ui_state.filter.until = None;
        self.ui_state.since_input.clear();
        self.ui_state.until_input.clear();
        self.ui_state.range_input_active = false;
        self.ui_state.range_error = None;
        self.stream = None;
        self.stream_pending = false;
    }

    /// Flip the timestamp flag; returns the new value
    pub fn toggle_timestamps(&mut self) -> bool {
        self.ui_state.filter.show_timestamps = !self.ui_state.filter.show_timestamps;
        self.ui_state.filter.show_timestamps
    }

    /// Open the range input bar on the From field
    pub fn open_range_input(&mut self) {
        self.ui_state.range_input_active = true;
        self.ui_state.range_field = RangeField::Since;
        self.ui_state.range_error = None;
    }

    pub fn close_range_input(&mut self) {
        self.ui_state.range_input_active = false;
        self.ui_state.range_error = None;
    }

    pub fn switch_range_field(&mut self) {
        self.ui_state.range_field = self.ui_state.range_field.other();
    }

    fn range_input_mut(&mut self) -> &mut String {
        match self.ui_state.range_field {
            RangeField::Since => &mut self.ui_state.since_input,
            RangeField::Until => &mut self.ui_state.until_input,
        }
    }

    pub fn range_input_char(&mut self, c: char) {
        self.range_input_mut().push(c);
    }

    pub fn range_input_backspace(&mut self) {
        self.range_input_mut().pop();
    }

    pub fn range_clear_field(&mut self) {
        self.range_input_mut().clear();
    }

    /// Validate the range fields and store them in the filter.
    ///
    /// Empty fields mean no bound. On success the bar closes and `true` is
    /// returned; on failure the bar stays open with an inline error and the
    /// filter is left untouched.
    pub fn apply_range_input(&mut self) -> bool {
        let since = match parse_bound("From", &self.ui_state.since_input) {
            Ok(since) => since,
            Err(e) => return self.reject_range(e),
        };
        let until = match parse_bound("To", &self.ui_state.until_input) {
            Ok(until) => until,
            Err(e) => return self.reject_range(e),
        };

        if let (Some(since), Some(until)) = (since, until)
            && since > until
        {
            return self.reject_range("From is after To".to_string());
        }

        self.ui_state.filter.since = since;
        self.ui_state.filter.until = until;
        self.close_range_input();
        true
    }

    fn reject_range(&mut self, error: String) -> bool {
        self.ui_state.range_error = Some(error);
        false
    }

    /// Forget the entered range; the running stream is not touched
    pub fn clear_range(&mut self) {
        self.ui_state.filter.since = None;
        self.ui_state.filter.until = None;
        self.ui_state.since_input.clear();
        self.ui_state.until_input.clear();
        self.ui_state.range_error = None;
    }
}

fn parse_bound(field: &str, input: &str) -> Result<Option<Timestamp>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse::<Timestamp>()
        .map(Some)
        .map_err(|e| format!("{field}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let (tx, _rx) = mpsc::unbounded_channel();
        AppState::new(tx)
    }

    fn type_text(state: &mut AppState, text: &str) {
        for c in text.chars() {
            state.range_input_char(c);
        }
    }

    #[test]
    fn test_apply_range_stores_both_bounds() {
        let mut state = state();
        state.open_range_input();
        type_text(&mut state, "2024-01-01T00:00:00Z");
        state.switch_range_field();
        type_text(&mut state, "2024-01-02");

        assert!(state.apply_range_input());
        assert!(!state.ui_state.range_input_active);
        assert_eq!(
            state.ui_state.filter.since.map(|t| t.to_string()).as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(
            state.ui_state.filter.until.map(|t| t.to_string()).as_deref(),
            Some("2024-01-02T00:00:00Z")
        );
    }

    #[test]
    fn test_empty_fields_mean_unbounded() {
        let mut state = state();
        state.open_range_input();
        type_text(&mut state, "2024-01-01 08:30:00");

        assert!(state.apply_range_input());
        assert!(state.ui_state.filter.since.is_some());
        assert!(state.ui_state.filter.until.is_none());
    }

    #[test]
    fn test_invalid_range_keeps_bar_open_and_filter_untouched() {
        let mut state = state();
        state.open_range_input();
        type_text(&mut state, "yesterday");

        assert!(!state.apply_range_input());
        assert!(state.ui_state.range_input_active);
        assert!(state.ui_state.range_error.as_deref().unwrap().starts_with("From:"));
        assert!(!state.ui_state.filter.has_range());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut state = state();
        state.open_range_input();
        type_text(&mut state, "2024-01-02");
        state.switch_range_field();
        type_text(&mut state, "2024-01-01");

        assert!(!state.apply_range_input());
        assert_eq!(state.ui_state.range_error.as_deref(), Some("From is after To"));
    }

    #[test]
    fn test_range_editing_targets_active_field() {
        let mut state = state();
        state.open_range_input();
        type_text(&mut state, "ab");
        state.range_input_backspace();
        state.switch_range_field();
        type_text(&mut state, "xyz");
        state.range_clear_field();

        assert_eq!(state.ui_state.since_input, "a");
        assert_eq!(state.ui_state.until_input, "");
    }

    #[test]
    fn test_clear_range_keeps_timestamp_flag() {
        let mut state = state();
        assert!(!state.toggle_timestamps());
        state.ui_state.filter.since = Some("2024-01-01".parse().unwrap());
        state.ui_state.since_input = "2024-01-01".to_string();

        state.clear_range();
        assert!(!state.ui_state.filter.has_range());
        assert!(state.ui_state.since_input.is_empty());
        assert!(!state.ui_state.filter.show_timestamps);
    }

    #[test]
    fn test_list_navigation_wraps() {
        let mut state = state();
        state.containers = vec![
            ContainerInfo::new("a".repeat(64), "web".to_string()),
            ContainerInfo::new("b".repeat(64), "db".to_string()),
        ];

        state.list_up();
        assert_eq!(state.selected_index(), Some(1));
        state.list_down();
        assert_eq!(state.selected_index(), Some(0));
    }

    #[test]
    fn test_find_container_by_name_or_id_prefix() {
        let mut state = state();
        state.containers = vec![
            ContainerInfo::new("abc123".to_string(), "web".to_string()),
            ContainerInfo::new("def456".to_string(), "db".to_string()),
        ];

        assert_eq!(state.find_container("db").unwrap().id, "def456");
        assert_eq!(state.find_container("abc").unwrap().names, "web");
        assert!(state.find_container("zzz").is_none());
    }

    #[test]
    fn test_navigation_stack() {
        let mut state = state();
        state.navigate_to(Screen::LogViewer);
        assert!(state.go_back());
        assert_eq!(state.current_screen, Screen::Resources(ResourceKind::Containers));
        assert!(!state.go_back());
    }

    fn with_resources() -> AppState {
        let mut state = state();
        state.containers = vec![
            ContainerInfo::new("abc123".to_string(), "web".to_string()),
            ContainerInfo::new("def456".to_string(), "db".to_string()),
        ];
        state.images = vec![ImageInfo {
            id: "sha256:feed".to_string(),
            ..ImageInfo::default()
        }];
        state.volumes = vec![VolumeInfo {
            name: "pgdata".to_string(),
            driver: "local".to_string(),
        }];
        state
    }

    #[test]
    fn test_container_actions_target_selection() {
        let mut state = with_resources();
        state.list_down();

        assert_eq!(
            state.resource_command(&Action::StartContainer),
            Some(ResourceCommand::StartContainer("def456".to_string()))
        );
        assert_eq!(
            state.resource_command(&Action::StopContainer),
            Some(ResourceCommand::StopContainer("def456".to_string()))
        );
        assert_eq!(
            state.resource_command(&Action::RestartContainer),
            Some(ResourceCommand::RestartContainer("def456".to_string()))
        );
        assert_eq!(
            state.resource_command(&Action::RemoveSelected),
            Some(ResourceCommand::RemoveContainer("def456".to_string()))
        );
        assert_eq!(
            state.resource_command(&Action::Prune),
            Some(ResourceCommand::PruneContainers)
        );
    }

    #[test]
    fn test_actions_follow_category() {
        let mut state = with_resources();

        state.switch_category(ResourceKind::Images);
        assert_eq!(state.current_list_len(), 1);
        assert_eq!(
            state.resource_command(&Action::RemoveSelected),
            Some(ResourceCommand::RemoveImage("sha256:feed".to_string()))
        );
        // container lifecycle keys mean nothing on images
        assert_eq!(state.resource_command(&Action::StartContainer), None);

        state.switch_category(ResourceKind::Volumes);
        assert_eq!(
            state.resource_command(&Action::RemoveSelected),
            Some(ResourceCommand::RemoveVolume("pgdata".to_string()))
        );
        assert_eq!(state.resource_command(&Action::Prune), Some(ResourceCommand::PruneVolumes));

        state.navigate_to(Screen::LogViewer);
        assert_eq!(state.resource_command(&Action::Prune), None);
        state.switch_category(ResourceKind::Images);
        assert_eq!(state.current_screen, Screen::LogViewer);
    }

    #[test]
    fn test_empty_list_has_no_target() {
        let state = state();
        assert_eq!(state.resource_command(&Action::StopContainer), None);
        assert_eq!(
            state.resource_command(&Action::Prune),
            Some(ResourceCommand::PruneContainers)
        );
    }

    #[test]
    fn test_destructive_commands_wait_for_confirmation() {
        let mut state = with_resources();

        let start = ResourceCommand::StartContainer("abc123".to_string());
        assert_eq!(state.request_command(start.clone()), Some(start));
        assert!(state.ui_state.pending_command.is_none());

        assert_eq!(state.request_command(ResourceCommand::PruneImages), None);
        assert_eq!(state.confirm_command(), Some(ResourceCommand::PruneImages));
        assert_eq!(state.confirm_command(), None);

        state.request_command(ResourceCommand::RemoveVolume("pgdata".to_string()));
        state.cancel_command();
        assert_eq!(state.confirm_command(), None);
    }

    #[test]
    fn test_reload_clamps_selection() {
        let mut state = with_resources();
        state.list_down();
        assert_eq!(state.selected_index(), Some(1));

        state.containers.pop();
        state.clamp_selection();
        assert_eq!(state.selected_index(), Some(0));
    }
}
