/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Navigation
    GoBack,
    Quit,

    // Selection
    SelectContainer(String),
    Refresh,
    NextCategory,
    PrevCategory,

    // Resource management
    StartContainer,
    StopContainer,
    RestartContainer,
    RemoveSelected,
    Prune,
    Confirm,
    Cancel,

    // UI toggles
    ToggleHelp,

    // List navigation
    ListUp,
    ListDown,
    ListSelect,

    // Log viewer scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,

    // Log viewer stream controls
    ToggleTimestamps,
    ToggleLocalTime,
    ShowHistory,
    ClearLogs,
    ExportLogs,

    // Range input
    OpenRangeInput,
    CloseRangeInput,
    RangeInput(char),
    RangeBackspace,
    RangeClearField,
    RangeSwitchField,
    ApplyRange,
    ClearRange,

    // Render request
    Render,
}
