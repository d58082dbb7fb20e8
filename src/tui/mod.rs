mod app;
mod ui;

pub use app::{App, View};
pub use ui::ControlsLayout;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste,
        EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controls::{ControlsEffect, ControlsEvent, ControlsState};
use crate::doctor::{self, FLATHUB_URL, MPV_INSTALL_URL};
use crate::gateway::{BundleInfo, GatewayClient};
use crate::player::{ExitKind, PlayerEnvelope, PlayerEvent};
use crate::session::{LaunchOptions, PlaybackSession};
use crate::wizard::{WizardEffect, WizardEvent, WizardStep};

/// How long to wait for the renderer to be reaped after its socket closes
/// before deciding it did not crash.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Messages sent from background tasks to the UI
pub enum UiMessage {
    LookupFinished {
        identifier: String,
        result: Result<BundleInfo, String>,
    },
    DiscoveryFinished(Option<String>),
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    );
}

/// Run the interface until the user quits. Returns the process exit code.
pub async fn run(
    config: Config,
    player_command: Option<String>,
    config_path: Option<PathBuf>,
) -> io::Result<i32> {
    // Set up panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(player_command, config_path, config.report.issues_url.clone());
    let (tx, rx) = mpsc::channel::<UiMessage>(32);
    let (player_tx, player_rx) = mpsc::channel::<PlayerEnvelope>(64);

    let mut runtime = Runtime {
        gateway: GatewayClient::new(&config.gateway),
        config,
        tx,
        player_tx,
        session: None,
        next_session_id: 0,
    };

    let result = run_app(&mut terminal, &mut app, &mut runtime, rx, player_rx).await;

    runtime.end_session().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    result.map(|()| app.exit_code)
}

/// State owned by the UI loop that the drawing code never sees.
struct Runtime {
    config: Config,
    gateway: GatewayClient,
    tx: mpsc::Sender<UiMessage>,
    player_tx: mpsc::Sender<PlayerEnvelope>,
    session: Option<PlaybackSession>,
    next_session_id: u64,
}

impl Runtime {
    fn is_current(&self, session: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id() == session)
    }

    async fn end_session(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.teardown().await
        {
            warn!(error = %e, "session teardown failed");
        }
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    runtime: &mut Runtime,
    mut rx: mpsc::Receiver<UiMessage>,
    mut player_rx: mpsc::Receiver<PlayerEnvelope>,
) -> io::Result<()> {
    loop {
        // Draw UI
        let completed = terminal.draw(|f| ui::draw(f, app))?;
        app.screen = completed.area;
        app.frame_count = app.frame_count.wrapping_add(1);

        // Handle messages from background tasks
        while let Ok(msg) = rx.try_recv() {
            handle_message(app, runtime, msg).await;
        }
        while let Ok(envelope) = player_rx.try_recv() {
            handle_player_event(app, runtime, envelope).await;
        }

        if let Some(controls) = app.controls.as_mut() {
            controls.apply(ControlsEvent::Tick, Instant::now());
        }

        // Handle input with timeout
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    handle_key(app, runtime, key).await;
                }
                Event::Mouse(mouse) => handle_mouse(app, runtime, mouse).await,
                Event::Paste(text) => handle_paste(app, runtime, text).await,
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

async fn handle_message(app: &mut App, runtime: &mut Runtime, msg: UiMessage) {
    match msg {
        UiMessage::LookupFinished { identifier, result } => {
            let event = match result {
                Ok(info) => WizardEvent::LookupSucceeded { identifier, info },
                Err(error) => WizardEvent::LookupFailed { identifier, error },
            };
            apply_wizard(app, runtime, event).await;
        }
        UiMessage::DiscoveryFinished(found) => {
            app.is_probing = false;
            match found {
                Some(command) => app.player_found(command),
                None => app.set_status("mpv still not found"),
            }
        }
    }
}

async fn handle_player_event(app: &mut App, runtime: &mut Runtime, envelope: PlayerEnvelope) {
    if !runtime.is_current(envelope.session) {
        debug!(session = envelope.session, "dropping event from a finished session");
        return;
    }

    match envelope.event {
        PlayerEvent::Connected => apply_controls(app, runtime, ControlsEvent::Connected).await,
        PlayerEvent::Sample(sample) => {
            apply_controls(app, runtime, ControlsEvent::Sample(sample)).await
        }
        PlayerEvent::SubtitleFetched { index, path } => {
            apply_controls(app, runtime, ControlsEvent::SubtitleFetched { index, path }).await
        }
        PlayerEvent::SubtitleFailed { index, error } => {
            apply_controls(app, runtime, ControlsEvent::SubtitleFailed { index, error }).await
        }
        PlayerEvent::ConnectionLost(e) => {
            let kind = match runtime.session.as_ref() {
                Some(session) => session.exit_within(EXIT_GRACE).await,
                None => None,
            };
            info!(error = %e, exit = ?kind, "player connection lost");
            finish_session(app, runtime, kind).await;
        }
        PlayerEvent::Exited(kind) => finish_session(app, runtime, Some(kind)).await,
        PlayerEvent::CommandFailed { command, error } => {
            app.show_fatal(format!(
                "The player did not accept \"{}\": {}",
                command.to_request().name(),
                error
            ));
        }
    }
}

/// The renderer went away on its own. Either way the wizard comes back with
/// the selection intact; a crash also raises the error popup.
async fn finish_session(app: &mut App, runtime: &mut Runtime, kind: Option<ExitKind>) {
    runtime.end_session().await;
    app.return_to_wizard();

    if let Some(ExitKind::Crashed(reason)) = kind {
        error!(reason = %reason, "player crashed");
        app.show_fatal(format!("The player stopped unexpectedly ({})", reason));
    }
}

async fn apply_wizard(app: &mut App, runtime: &mut Runtime, event: WizardEvent) {
    for effect in app.wizard.apply(event) {
        match effect {
            WizardEffect::StartLookup(identifier) => {
                let gateway = runtime.gateway.clone();
                let tx = runtime.tx.clone();
                tokio::spawn(async move {
                    let result = gateway.lookup(&identifier).await.map_err(|e| e.to_string());
                    let _ = tx
                        .send(UiMessage::LookupFinished { identifier, result })
                        .await;
                });
            }
            WizardEffect::StartSession(request) => {
                let Some(command) = app.player_command.clone() else {
                    app.show_player_missing();
                    continue;
                };

                runtime.end_session().await;
                runtime.next_session_id += 1;
                let launch = LaunchOptions {
                    command,
                    args: runtime.config.player.args.clone(),
                    scratch_root: runtime.config.storage.temp_dir(),
                };

                match PlaybackSession::start(
                    runtime.next_session_id,
                    &request,
                    runtime.gateway.clone(),
                    &launch,
                    runtime.player_tx.clone(),
                ) {
                    Ok(session) => {
                        runtime.session = Some(session);
                        app.controls = Some(ControlsState::new(&request));
                        app.view = View::Controls;
                    }
                    Err(e) if e.is_player_missing() => {
                        warn!(error = %e, "player could not be launched");
                        app.show_player_missing();
                    }
                    Err(e) => {
                        error!(error = %e, "failed to start playback session");
                        app.show_fatal(e.to_string());
                    }
                }
            }
        }
    }
}

async fn apply_controls(app: &mut App, runtime: &mut Runtime, event: ControlsEvent) {
    let Some(controls) = app.controls.as_mut() else {
        return;
    };

    for effect in controls.apply(event, Instant::now()) {
        match effect {
            ControlsEffect::Send(command) => {
                if let Some(session) = &runtime.session {
                    session.dispatch(command);
                }
            }
            ControlsEffect::FetchSubtitle { index, remote_path } => {
                if let Some(session) = &runtime.session {
                    session.fetch_subtitle(index, remote_path);
                }
            }
            ControlsEffect::CopyToClipboard(text) => match copy_to_clipboard(&text) {
                Ok(()) => app.set_status("Magnet link copied"),
                Err(e) => {
                    warn!(error = %e, "clipboard unavailable");
                    app.set_status(format!("Could not copy: {}", e));
                }
            },
            ControlsEffect::ReportError(message) => {
                warn!(error = %message, "playback error");
                app.show_fatal(message);
            }
            ControlsEffect::Stop => {
                info!("stopping playback");
                runtime.end_session().await;
                app.return_to_wizard();
                return;
            }
        }
    }
}

fn copy_to_clipboard(text: &str) -> Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())
}

fn open_url(app: &mut App, url: &str) {
    if let Err(e) = webbrowser::open(url) {
        warn!(url, error = %e, "failed to open browser");
        app.set_status(format!("Could not open {}", url));
    }
}

async fn handle_key(app: &mut App, runtime: &mut Runtime, key: KeyEvent) {
    // Global quit
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit(0);
        return;
    }

    if app.fatal_error.is_some() {
        handle_fatal_key(app, key);
        return;
    }

    match app.view {
        View::Wizard => handle_wizard_key(app, runtime, key).await,
        View::Controls => handle_controls_key(app, runtime, key).await,
        View::PlayerMissing => handle_player_missing_key(app, runtime, key),
    }
}

/// Report and close both quit with a failure code; Esc hides the popup and
/// whatever was running underneath carries on.
fn handle_fatal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('r') => {
            let url = app.issues_url.clone();
            open_url(app, &url);
            app.quit(1);
        }
        KeyCode::Char('c') | KeyCode::Char('q') => app.quit(1),
        KeyCode::Esc => app.dismiss_fatal(),
        _ => {}
    }
}

async fn handle_wizard_key(app: &mut App, runtime: &mut Runtime, key: KeyEvent) {
    let wizard = &app.wizard;

    if wizard.notice.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            apply_wizard(app, runtime, WizardEvent::DismissNotice).await;
        }
        return;
    }

    let step = wizard.step;
    let event = match step {
        WizardStep::Welcome => match key.code {
            KeyCode::Esc | KeyCode::Char('q')
                if wizard.selection.identifier.is_empty() && wizard.entry_enabled() =>
            {
                app.quit(0);
                return;
            }
            KeyCode::Esc => WizardEvent::ClearInput,
            KeyCode::Enter => WizardEvent::Submit,
            KeyCode::Backspace => WizardEvent::Backspace,
            KeyCode::Char(c) => WizardEvent::Input(c),
            _ => return,
        },
        WizardStep::MediaSelection => match key.code {
            KeyCode::Char('q') => {
                app.quit(0);
                return;
            }
            KeyCode::Esc => WizardEvent::Back,
            KeyCode::Up | KeyCode::Char('k') => WizardEvent::CursorUp,
            KeyCode::Down | KeyCode::Char('j') => WizardEvent::CursorDown,
            KeyCode::Char(' ') => WizardEvent::SelectCandidate,
            KeyCode::Enter => {
                apply_wizard(app, runtime, WizardEvent::SelectCandidate).await;
                WizardEvent::Next
            }
            _ => return,
        },
        WizardStep::Ready => match key.code {
            KeyCode::Char('q') => {
                app.quit(0);
                return;
            }
            KeyCode::Esc => WizardEvent::Back,
            KeyCode::Char(' ') => WizardEvent::ToggleRightsConfirmation,
            KeyCode::Enter => WizardEvent::Play,
            _ => return,
        },
    };

    apply_wizard(app, runtime, event).await;
}

async fn handle_controls_key(app: &mut App, runtime: &mut Runtime, key: KeyEvent) {
    let Some(controls) = app.controls.as_ref() else {
        return;
    };

    let event = if controls.local_prompt.is_some() {
        match key.code {
            KeyCode::Esc => ControlsEvent::LocalPromptCancel,
            KeyCode::Enter => ControlsEvent::LocalPromptSubmit,
            KeyCode::Backspace => ControlsEvent::LocalPromptBackspace,
            KeyCode::Char(c) => ControlsEvent::LocalPromptInput(c),
            _ => return,
        }
    } else if controls.is_preparing() {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => ControlsEvent::Stop,
            _ => return,
        }
    } else if controls.subtitles_open {
        match key.code {
            KeyCode::Esc | KeyCode::Char('s') => ControlsEvent::ToggleSubtitles,
            KeyCode::Up | KeyCode::Char('k') => ControlsEvent::SubtitleCursorUp,
            KeyCode::Down | KeyCode::Char('j') => ControlsEvent::SubtitleCursorDown,
            KeyCode::Enter => ControlsEvent::SubtitleSelect,
            KeyCode::Char('a') => ControlsEvent::OpenLocalPrompt,
            _ => return,
        }
    } else if controls.description_open {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('i') => ControlsEvent::ToggleDescription,
            _ => return,
        }
    } else {
        match key.code {
            KeyCode::Char(' ') => ControlsEvent::TogglePlayPause,
            KeyCode::Left => ControlsEvent::SeekBy { forward: false },
            KeyCode::Right => ControlsEvent::SeekBy { forward: true },
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => ControlsEvent::VolumeUp,
            KeyCode::Char('-') | KeyCode::Down => ControlsEvent::VolumeDown,
            KeyCode::Char('f') => ControlsEvent::ToggleFullscreen,
            KeyCode::Char('s') => ControlsEvent::ToggleSubtitles,
            KeyCode::Char('i') => ControlsEvent::ToggleDescription,
            KeyCode::Char('y') => ControlsEvent::CopyMagnet,
            KeyCode::Char('q') | KeyCode::Esc => ControlsEvent::Stop,
            _ => return,
        }
    };

    apply_controls(app, runtime, event).await;
}

fn handle_player_missing_key(app: &mut App, runtime: &Runtime, key: KeyEvent) {
    if app.is_probing {
        return;
    }

    match key.code {
        KeyCode::Char('f') if cfg!(target_os = "linux") => open_url(app, FLATHUB_URL),
        KeyCode::Char('w') => open_url(app, MPV_INSTALL_URL),
        KeyCode::Char('m') => app.show_manual_setup = !app.show_manual_setup,
        KeyCode::Char('r') => {
            app.is_probing = true;
            let tx = runtime.tx.clone();
            tokio::spawn(async move {
                let found = doctor::find_working_player().await;
                let _ = tx.send(UiMessage::DiscoveryFinished(found)).await;
            });
        }
        KeyCode::Char('q') | KeyCode::Esc => app.quit(0),
        _ => {}
    }
}

async fn handle_mouse(app: &mut App, runtime: &mut Runtime, mouse: MouseEvent) {
    if app.view != View::Controls || app.fatal_error.is_some() {
        return;
    }
    let Some(controls) = app.controls.as_ref() else {
        return;
    };
    if has_popup(controls) {
        return;
    }

    let layout = ControlsLayout::new(app.screen);
    let on_bar = layout.on_seek_bar(mouse.column, mouse.row);
    let fraction = layout.seek_fraction(mouse.column);

    let event = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_bar => ControlsEvent::SeekPress(fraction),
        MouseEventKind::Drag(MouseButton::Left) => ControlsEvent::SeekDrag(fraction),
        MouseEventKind::Up(MouseButton::Left) => ControlsEvent::SeekRelease(fraction),
        MouseEventKind::Moved => ControlsEvent::HoverSeekBar(on_bar),
        _ => return,
    };

    apply_controls(app, runtime, event).await;
}

async fn handle_paste(app: &mut App, runtime: &mut Runtime, text: String) {
    if app.fatal_error.is_some() {
        return;
    }

    match app.view {
        View::Wizard if app.wizard.notice.is_none() => {
            apply_wizard(app, runtime, WizardEvent::Paste(text)).await
        }
        View::Controls => {
            let prompt_open = app
                .controls
                .as_ref()
                .is_some_and(|c| c.local_prompt.is_some());
            if prompt_open {
                apply_controls(app, runtime, ControlsEvent::LocalPromptPaste(text)).await;
            }
        }
        _ => {}
    }
}

fn has_popup(controls: &ControlsState) -> bool {
    controls.is_preparing()
        || controls.subtitles_open
        || controls.description_open
        || controls.local_prompt.is_some()
}
