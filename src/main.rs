use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use nanowhale_engine::{EngineClient, EngineError, ResourceCommand};
use nanowhale_logs::{
    ClockAnswer, ClockQuery, LogBuffer, LogSink, RestartMode, SinkEvent, StreamController,
};
use nanowhale_tui::{
    Action, AppState, Event, EventHandler, HelpOverlay, KeyBindings, KeyContext, LogViewerScreen,
    ResourceListScreen, Screen, Tui,
};
use nanowhale_types::{ContainerInfo, ImageInfo, ResourceKind, VolumeInfo};

mod config;

use config::Config;

/// nanowhale - A terminal UI for following container logs
#[derive(Parser, Debug)]
#[command(name = "nanowhale")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Container name or id to open directly (optional, will prompt if not provided)
    #[arg(value_name = "CONTAINER")]
    container: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Buffer size for log lines (overrides the config file)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref())?;

    // Run the application
    let result = run_app(args).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

/// Internal actions for async operations
enum InternalAction {
    Load(ResourceKind),
    ContainersLoaded(Vec<ContainerInfo>),
    ImagesLoaded(Vec<ImageInfo>),
    VolumesLoaded(Vec<VolumeInfo>),
    OpenLogs(ContainerInfo),
    RestartStream(RestartMode),
    ClockResolved(ClockAnswer),
    RunCommand(ResourceCommand),
    CommandFinished {
        command: ResourceCommand,
        result: Result<String, EngineError>,
    },
    Error(String),
}

async fn run_app(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let buffer_size = args.buffer_size.unwrap_or(config.view.buffer_size);

    // Create action channels
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<InternalAction>();

    // Each log view gets its own sink channel; until one is open this one stays closed
    let (_, mut sink_rx) = mpsc::unbounded_channel::<SinkEvent>();

    // Initialize state
    let mut state = AppState::new(action_tx.clone());
    state.ui_state.filter.show_timestamps = config.view.show_timestamps;
    state.ui_state.use_local_time = config.view.local_time;

    let engine = EngineClient::new(config.engine);
    state.containers = engine
        .list_containers()
        .await
        .context("failed to list containers")?;

    // Handle CLI argument for direct navigation
    if let Some(target) = &args.container {
        let container = state
            .find_container(target)
            .cloned()
            .with_context(|| format!("container '{}' not found", target))?;
        let _ = action_tx.send(Action::SelectContainer(container.id));
    }

    let mut log_buffer = LogBuffer::new(buffer_size);
    let mut controller: Option<StreamController> = None;

    // Initialize TUI
    let mut tui = Tui::new().context("failed to set up the terminal")?;

    // Initialize event handler
    let mut events = EventHandler::new(Duration::from_millis(100));

    // Initialize keybindings
    let keybindings = KeyBindings::new();

    // Initial render
    render(&mut tui, &mut state, &log_buffer)?;

    // Main event loop
    loop {
        tokio::select! {
            // Handle terminal events
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        state.dismiss_error();

                        let action = if state.ui_state.pending_command.is_some() {
                            keybindings.get_action(KeyContext::Confirm, &key)
                        } else if state.ui_state.range_input_active
                            && state.current_screen == Screen::LogViewer
                        {
                            keybindings.get_range_input_action(&key)
                        } else {
                            let context = match state.current_screen {
                                Screen::Resources(ResourceKind::Containers) => KeyContext::ContainerList,
                                Screen::Resources(_) => KeyContext::ListNavigation,
                                Screen::LogViewer => KeyContext::LogViewer,
                            };
                            keybindings.get_action(context, &key)
                        };

                        if let Some(action) = action {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Tick => {
                        // Redraw picks up worker state changes
                    }
                    Event::Resize(_, _) => {
                        let _ = action_tx.send(Action::Render);
                    }
                    Event::Error(e) => {
                        state.show_error(e);
                    }
                }
            }

            // Apply sink events in submission order
            Some(event) = sink_rx.recv() => {
                log_buffer.apply(event);
                while let Ok(event) = sink_rx.try_recv() {
                    log_buffer.apply(event);
                }
            }

            // Handle user actions
            Some(action) = action_rx.recv() => {
                handle_action(&mut state, &internal_tx, &mut controller, &log_buffer, action);
            }

            // Handle internal async actions
            Some(internal) = internal_rx.recv() => {
                match internal {
                    InternalAction::Load(kind) => {
                        spawn_load(&engine, kind, &internal_tx);
                    }

                    InternalAction::ContainersLoaded(containers) => {
                        state.containers = containers;
                        if state.current_kind() == Some(ResourceKind::Containers) {
                            state.clamp_selection();
                        }
                    }

                    InternalAction::ImagesLoaded(images) => {
                        state.images = images;
                        if state.current_kind() == Some(ResourceKind::Images) {
                            state.clamp_selection();
                        }
                    }

                    InternalAction::VolumesLoaded(volumes) => {
                        state.volumes = volumes;
                        if state.current_kind() == Some(ResourceKind::Volumes) {
                            state.clamp_selection();
                        }
                    }

                    InternalAction::OpenLogs(container) => {
                        close_logs(&mut controller, &mut state);

                        let (sink, rx) = LogSink::channel();
                        sink_rx = rx;
                        log_buffer = LogBuffer::new(buffer_size);

                        let mut opened = StreamController::new(engine.clone(), sink, container.id.clone());
                        spawn_clock_query(opened.open(&state.ui_state.filter), &internal_tx);
                        info!(container = %container.display_name(), "log view opened");
                        sync_stream(&mut state, &opened);
                        controller = Some(opened);
                    }

                    InternalAction::RestartStream(mode) => {
                        if let Some(controller) = controller.as_mut() {
                            if mode.clears_view() {
                                state.ui_state.log_scroll = 0;
                                state.ui_state.auto_scroll = true;
                            }
                            if let Some(query) = controller.restart(mode, &state.ui_state.filter) {
                                spawn_clock_query(query, &internal_tx);
                            }
                            sync_stream(&mut state, controller);
                        }
                    }

                    InternalAction::ClockResolved(answer) => {
                        // The view may have been closed while the clock was out
                        if let Some(controller) = controller.as_mut() {
                            controller.resolve(answer);
                            sync_stream(&mut state, controller);
                        }
                    }

                    InternalAction::RunCommand(command) => {
                        spawn_command(&engine, command, &internal_tx);
                    }

                    InternalAction::CommandFinished { command, result } => {
                        match result {
                            Ok(message) => {
                                info!(%command, "engine command finished");
                                state.show_error(message);
                            }
                            Err(e) => {
                                warn!(%command, error = %e, "engine command failed");
                                state.show_error(format!("{} failed: {}", command, e));
                            }
                        }
                        spawn_load(&engine, command.kind(), &internal_tx);
                    }

                    InternalAction::Error(msg) => {
                        state.show_error(msg);
                    }
                }
            }
        }

        if state.should_quit {
            break;
        }

        render(&mut tui, &mut state, &log_buffer)?;
    }

    // Cleanup
    close_logs(&mut controller, &mut state);
    events.shutdown();
    tui.restore()?;

    Ok(())
}

/// Tear down the log view's streams
fn close_logs(controller: &mut Option<StreamController>, state: &mut AppState) {
    if let Some(mut controller) = controller.take() {
        let stopped = controller.shutdown();
        debug!(container = %controller.target(), stopped, "log view closed");
    }
    state.stream = None;
    state.stream_pending = false;
}

fn sync_stream(state: &mut AppState, controller: &StreamController) {
    state.stream = controller.current().cloned();
    state.stream_pending = controller.is_pending();
}

/// Ask the engine for its clock off the event loop; the answer comes back
/// as [`InternalAction::ClockResolved`]
fn spawn_clock_query(query: ClockQuery, internal_tx: &mpsc::UnboundedSender<InternalAction>) {
    let tx = internal_tx.clone();
    tokio::spawn(async move {
        let answer = query.run().await;
        let _ = tx.send(InternalAction::ClockResolved(answer));
    });
}

fn spawn_load(
    engine: &EngineClient,
    kind: ResourceKind,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
) {
    let engine = engine.clone();
    let tx = internal_tx.clone();
    tokio::spawn(async move {
        let loaded = match kind {
            ResourceKind::Containers => engine
                .list_containers()
                .await
                .map(InternalAction::ContainersLoaded),
            ResourceKind::Images => engine.list_images().await.map(InternalAction::ImagesLoaded),
            ResourceKind::Volumes => engine.list_volumes().await.map(InternalAction::VolumesLoaded),
        };
        let action = loaded.unwrap_or_else(|e| {
            InternalAction::Error(format!(
                "Failed to list {}: {}",
                kind.label().to_lowercase(),
                e
            ))
        });
        let _ = tx.send(action);
    });
}

fn spawn_command(
    engine: &EngineClient,
    command: ResourceCommand,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
) {
    let engine = engine.clone();
    let tx = internal_tx.clone();
    tokio::spawn(async move {
        let result = engine.execute(&command).await;
        let _ = tx.send(InternalAction::CommandFinished { command, result });
    });
}

fn handle_action(
    state: &mut AppState,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
    controller: &mut Option<StreamController>,
    log_buffer: &LogBuffer,
    action: Action,
) {
    let restart = |mode| {
        let _ = internal_tx.send(InternalAction::RestartStream(mode));
    };

    match action {
        Action::Quit => {
            close_logs(controller, state);
            state.should_quit = true;
        }
        Action::GoBack => {
            if state.ui_state.help_visible {
                state.ui_state.help_visible = false;
                return;
            }
            // Leaving the log viewer stops its streams first
            if state.current_screen == Screen::LogViewer {
                close_logs(controller, state);
            }
            if !state.go_back() {
                state.should_quit = true;
            }
        }
        Action::ListUp => {
            state.list_up();
        }
        Action::ListDown => {
            state.list_down();
        }
        Action::ListSelect => {
            if let Some(container) = state.selected_container_in_list() {
                let _ = state
                    .action_tx
                    .send(Action::SelectContainer(container.id.clone()));
            }
        }
        Action::SelectContainer(id) => {
            if let Some(container) = state.find_container(&id).cloned() {
                state.reset_log_view();
                state.selected_container = Some(container.clone());
                state.navigate_to(Screen::LogViewer);
                let _ = internal_tx.send(InternalAction::OpenLogs(container));
            }
        }
        Action::Refresh => {
            if let Some(kind) = state.current_kind() {
                let _ = internal_tx.send(InternalAction::Load(kind));
            }
        }
        Action::NextCategory | Action::PrevCategory => {
            if let Some(kind) = state.current_kind() {
                let kind = if action == Action::NextCategory {
                    kind.next()
                } else {
                    kind.prev()
                };
                state.switch_category(kind);
                let _ = internal_tx.send(InternalAction::Load(kind));
            }
        }

        // Resource management
        Action::StartContainer
        | Action::StopContainer
        | Action::RestartContainer
        | Action::RemoveSelected
        | Action::Prune => {
            if let Some(command) = state.resource_command(&action)
                && let Some(command) = state.request_command(command)
            {
                let _ = internal_tx.send(InternalAction::RunCommand(command));
            }
        }
        Action::Confirm => {
            if let Some(command) = state.confirm_command() {
                let _ = internal_tx.send(InternalAction::RunCommand(command));
            }
        }
        Action::Cancel => {
            state.cancel_command();
        }

        // Log viewer actions
        Action::ScrollUp(n) => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_sub(n);
        }
        Action::ScrollDown(n) => {
            state.ui_state.auto_scroll = false;
            // Don't cap here - rendering clamps to the buffer length
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_add(n);
        }
        Action::PageUp => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_sub(20);
        }
        Action::PageDown => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_add(20);
        }
        Action::ScrollToTop => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = 0;
        }
        Action::ScrollToBottom => {
            state.ui_state.auto_scroll = false;
            // Set to max value - rendering clamps to the actual bottom
            state.ui_state.log_scroll = usize::MAX;
        }
        Action::ToggleAutoScroll => {
            state.ui_state.auto_scroll = !state.ui_state.auto_scroll;
        }

        // Stream controls
        Action::ToggleTimestamps => {
            state.toggle_timestamps();
            restart(RestartMode::TimestampToggle);
        }
        Action::ToggleLocalTime => {
            state.ui_state.use_local_time = !state.ui_state.use_local_time;
        }
        Action::ShowHistory => {
            restart(RestartMode::History);
        }
        Action::ClearLogs => {
            restart(RestartMode::Clear);
        }
        Action::ExportLogs => {
            let name = state
                .selected_container
                .as_ref()
                .map(|c| c.display_name().to_string())
                .unwrap_or_else(|| "logs".to_string());
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let filename = format!("{}_{}.log", name, timestamp);

            match export_logs_to_file(Path::new(&filename), log_buffer) {
                Ok(count) => {
                    state.show_error(format!("Exported {} lines to {}", count, filename));
                }
                Err(e) => {
                    state.show_error(format!("Export failed: {:#}", e));
                }
            }
        }

        // Range input
        Action::OpenRangeInput => {
            state.open_range_input();
        }
        Action::CloseRangeInput => {
            state.close_range_input();
        }
        Action::RangeInput(c) => {
            state.range_input_char(c);
        }
        Action::RangeBackspace => {
            state.range_input_backspace();
        }
        Action::RangeClearField => {
            state.range_clear_field();
        }
        Action::RangeSwitchField => {
            state.switch_range_field();
        }
        Action::ApplyRange => {
            if state.apply_range_input() {
                restart(RestartMode::Range);
            }
        }
        Action::ClearRange => {
            state.clear_range();
        }

        Action::ToggleHelp => {
            state.ui_state.help_visible = !state.ui_state.help_visible;
        }
        Action::Render => {}
    }
}

fn render(tui: &mut Tui, state: &mut AppState, log_buffer: &LogBuffer) -> Result<()> {
    tui.terminal().draw(|frame| {
        match state.current_screen {
            Screen::Resources(_) => {
                ResourceListScreen::render(frame, state);
            }
            Screen::LogViewer => {
                LogViewerScreen::render(frame, state, log_buffer);
            }
        }

        // Render help overlay if visible
        if state.ui_state.help_visible {
            HelpOverlay::render(frame);
        }
    })?;

    Ok(())
}

/// Write the buffered lines exactly as received, one per line
fn export_logs_to_file(path: &Path, log_buffer: &LogBuffer) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let entries = log_buffer.all();
    for entry in &entries {
        writeln!(writer, "{}", entry.raw)?;
    }
    writer.flush()?;

    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanowhale_logs::LineKind;

    #[test]
    fn test_export_writes_raw_lines() {
        let buffer = LogBuffer::new(10);
        for line in ["2024-03-01T12:00:00Z one", "two"] {
            buffer.apply(SinkEvent::Append {
                epoch: 0,
                kind: LineKind::Output,
                stamped: true,
                line: line.to_string(),
            });
        }

        let path = std::env::temp_dir().join(format!("nanowhale-export-{}.log", std::process::id()));
        let count = export_logs_to_file(&path, &buffer).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(count, 2);
        assert_eq!(written, "2024-03-01T12:00:00Z one\ntwo\n");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "nanowhale",
            "web",
            "--buffer-size",
            "500",
            "--log-file",
            "/tmp/nanowhale.log",
        ])
        .unwrap();

        assert_eq!(args.container.as_deref(), Some("web"));
        assert_eq!(args.buffer_size, Some(500));
        assert_eq!(args.log_file.as_deref(), Some(Path::new("/tmp/nanowhale.log")));
        assert!(args.config.is_none());
    }
}
