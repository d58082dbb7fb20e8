use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;

use crate::controls::ControlsState;
use crate::wizard::WizardState;

const STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Magnet link, media selection and confirmation steps
    Wizard,
    /// Remote control for a running player
    Controls,
    /// No usable player was found
    PlayerMissing,
}

pub struct App {
    pub view: View,
    pub should_quit: bool,
    pub exit_code: i32,

    pub wizard: WizardState,
    pub controls: Option<ControlsState>,

    // Player discovery
    pub player_command: Option<String>,
    pub config_path: Option<PathBuf>,
    pub show_manual_setup: bool,
    pub is_probing: bool,

    /// Error popup drawn over whatever view is current. Reporting or
    /// closing quits; dismissing leaves the session running.
    pub fatal_error: Option<String>,
    pub issues_url: String,
    pub status: Option<(String, Instant)>,

    /// Last drawn terminal size, for mouse hit-testing
    pub screen: Rect,
    /// Bumped on every redraw, drives the spinner
    pub frame_count: u64,
}

impl App {
    pub fn new(
        player_command: Option<String>,
        config_path: Option<PathBuf>,
        issues_url: impl Into<String>,
    ) -> Self {
        let view = if player_command.is_some() {
            View::Wizard
        } else {
            View::PlayerMissing
        };

        Self {
            view,
            should_quit: false,
            exit_code: 0,
            wizard: WizardState::new(),
            controls: None,
            player_command,
            config_path,
            show_manual_setup: false,
            is_probing: false,
            fatal_error: None,
            issues_url: issues_url.into(),
            status: None,
            screen: Rect::default(),
            frame_count: 0,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TTL)
            .map(|(message, _)| message.as_str())
    }

    pub fn show_fatal(&mut self, message: impl Into<String>) {
        self.fatal_error = Some(message.into());
    }

    pub fn dismiss_fatal(&mut self) {
        self.fatal_error = None;
    }

    pub fn show_player_missing(&mut self) {
        self.controls = None;
        self.show_manual_setup = false;
        self.view = View::PlayerMissing;
    }

    /// Back to the wizard after a session ends; its state is kept so the
    /// same file can be played again.
    pub fn return_to_wizard(&mut self) {
        self.controls = None;
        self.view = View::Wizard;
    }

    pub fn player_found(&mut self, command: String) {
        self.player_command = Some(command);
        self.is_probing = false;
        self.view = View::Wizard;
    }

    pub fn quit(&mut self, exit_code: i32) {
        self.exit_code = exit_code;
        self.should_quit = true;
    }

    pub fn spinner(&self) -> &'static str {
        const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        FRAMES[(self.frame_count as usize) % FRAMES.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::subtitles::SubtitleCandidate;
    use crate::wizard::SessionRequest;

    const ISSUES: &str = "https://example.com/issues";

    fn app() -> App {
        App::new(Some("mpv".to_string()), None, ISSUES)
    }

    #[test]
    fn test_starts_on_player_missing_without_player() {
        let app = App::new(None, None, ISSUES);
        assert_eq!(app.view, View::PlayerMissing);

        let app = self::app();
        assert_eq!(app.view, View::Wizard);
        assert_eq!(app.issues_url, ISSUES);
    }

    #[test]
    fn test_fatal_and_quit() {
        let mut app = app();
        app.show_fatal("player crashed");
        assert_eq!(app.fatal_error.as_deref(), Some("player crashed"));

        app.quit(1);
        assert!(app.should_quit);
        assert_eq!(app.exit_code, 1);
    }

    #[test]
    fn test_error_popup_keeps_session() {
        let mut app = app();
        app.controls = Some(ControlsState::new(&SessionRequest {
            identifier: "magnet:?xt=urn:btih:abc".to_string(),
            selected_path: "Movie/a.mp4".to_string(),
            title: "Movie".to_string(),
            description: String::new(),
            subtitles: vec![SubtitleCandidate::none()],
        }));
        app.view = View::Controls;

        app.show_fatal("Could not download subtitle: HTTP 404");
        assert_eq!(app.view, View::Controls);
        assert!(app.controls.is_some());

        app.dismiss_fatal();
        assert!(app.fatal_error.is_none());
        assert_eq!(app.view, View::Controls);
        assert!(app.controls.is_some());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_status_message() {
        let mut app = app();
        assert_eq!(app.status_message(), None);

        app.set_status("Magnet link copied");
        assert_eq!(app.status_message(), Some("Magnet link copied"));

        app.status = Some(("old".to_string(), Instant::now() - STATUS_TTL * 2));
        assert_eq!(app.status_message(), None);
    }
}
