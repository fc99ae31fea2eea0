use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

use crate::app::Action;

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    ListNavigation,
    /// Container list; falls back to list navigation
    ContainerList,
    LogViewer,
    RangeInput,
    /// A destructive command is waiting for yes/no
    Confirm,
}

impl KeyContext {
    /// Context consulted when this one has no binding for a key
    fn parent(self) -> Option<Self> {
        match self {
            Self::Global | Self::Confirm => None,
            Self::ContainerList => Some(Self::ListNavigation),
            Self::ListNavigation | Self::LogViewer | Self::RangeInput => Some(Self::Global),
        }
    }
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        // Global bindings
        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::new(KeyCode::Esc), Action::GoBack);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // List navigation bindings
        let mut list_nav = HashMap::new();
        list_nav.insert(KeyBinding::new(KeyCode::Char('j')), Action::ListDown);
        list_nav.insert(KeyBinding::new(KeyCode::Down), Action::ListDown);
        list_nav.insert(KeyBinding::new(KeyCode::Char('k')), Action::ListUp);
        list_nav.insert(KeyBinding::new(KeyCode::Up), Action::ListUp);
        list_nav.insert(KeyBinding::new(KeyCode::Enter), Action::ListSelect);
        list_nav.insert(KeyBinding::new(KeyCode::Char('r')), Action::Refresh);
        list_nav.insert(KeyBinding::new(KeyCode::Tab), Action::NextCategory);
        list_nav.insert(KeyBinding::shift(KeyCode::BackTab), Action::PrevCategory);
        list_nav.insert(KeyBinding::shift(KeyCode::Char('D')), Action::RemoveSelected);
        list_nav.insert(KeyBinding::shift(KeyCode::Char('P')), Action::Prune);
        bindings.insert(KeyContext::ListNavigation, list_nav);

        // Container lifecycle
        let mut containers = HashMap::new();
        containers.insert(KeyBinding::new(KeyCode::Char('s')), Action::StartContainer);
        containers.insert(KeyBinding::shift(KeyCode::Char('S')), Action::StopContainer);
        containers.insert(KeyBinding::shift(KeyCode::Char('R')), Action::RestartContainer);
        bindings.insert(KeyContext::ContainerList, containers);

        // Confirmation prompt; anything unbound is ignored
        let mut confirm = HashMap::new();
        confirm.insert(KeyBinding::new(KeyCode::Char('y')), Action::Confirm);
        confirm.insert(KeyBinding::shift(KeyCode::Char('Y')), Action::Confirm);
        confirm.insert(KeyBinding::new(KeyCode::Enter), Action::Confirm);
        confirm.insert(KeyBinding::new(KeyCode::Char('n')), Action::Cancel);
        confirm.insert(KeyBinding::shift(KeyCode::Char('N')), Action::Cancel);
        confirm.insert(KeyBinding::new(KeyCode::Esc), Action::Cancel);
        confirm.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Cancel);
        bindings.insert(KeyContext::Confirm, confirm);

        // Log viewer bindings - less-like navigation
        let mut log_viewer = HashMap::new();
        // Line navigation
        log_viewer.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        log_viewer.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        // Page navigation (less-style)
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        log_viewer.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        log_viewer.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        log_viewer.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        // Top/bottom navigation (less-style)
        log_viewer.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::Home), Action::ScrollToTop);
        log_viewer.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('f')), Action::ToggleAutoScroll);
        // Stream controls
        log_viewer.insert(KeyBinding::new(KeyCode::Char('t')), Action::ToggleTimestamps);
        log_viewer.insert(KeyBinding::shift(KeyCode::Char('T')), Action::ToggleLocalTime);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('h')), Action::ShowHistory);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('c')), Action::ClearLogs);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('r')), Action::OpenRangeInput);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('x')), Action::ClearRange);
        log_viewer.insert(KeyBinding::new(KeyCode::Char('e')), Action::ExportLogs);
        bindings.insert(KeyContext::LogViewer, log_viewer);

        // Range input bindings (when the range bar is open)
        let mut range_input = HashMap::new();
        range_input.insert(KeyBinding::new(KeyCode::Enter), Action::ApplyRange);
        range_input.insert(KeyBinding::new(KeyCode::Esc), Action::CloseRangeInput);
        range_input.insert(KeyBinding::new(KeyCode::Tab), Action::RangeSwitchField);
        range_input.insert(KeyBinding::shift(KeyCode::BackTab), Action::RangeSwitchField);
        range_input.insert(KeyBinding::new(KeyCode::Backspace), Action::RangeBackspace);
        range_input.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::RangeClearField);
        range_input.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::CloseRangeInput);
        bindings.insert(KeyContext::RangeInput, range_input);

        Self { bindings }
    }

    /// Look up action for key event in given context, walking up to the
    /// more general contexts until one binds the key
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);
        let mut context = Some(context);

        while let Some(current) = context {
            if let Some(action) = self
                .bindings
                .get(&current)
                .and_then(|context_bindings| context_bindings.get(&binding))
            {
                return Some(action.clone());
            }
            context = current.parent();
        }

        None
    }

    /// Handle key event while the range bar is open.
    /// Returns Some(Action) for special keys and typed characters, None otherwise
    pub fn get_range_input_action(&self, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&KeyContext::RangeInput)
            .and_then(|range_bindings| range_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // For regular characters, return RangeInput action
        if let KeyCode::Char(c) = key.code
            && (key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT)
        {
            return Some(Action::RangeInput(c));
        }

        None
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}
