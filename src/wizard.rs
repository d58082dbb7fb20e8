use tracing::{info, warn};

use crate::gateway::BundleInfo;
use crate::media::{MediaCandidate, description_or_placeholder};
use crate::subtitles::{SubtitleCandidate, build_candidates};

pub const LOOKUP_FAILED_NOTICE: &str = "Could not get info for this magnet link.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardStep {
    #[default]
    Welcome,
    MediaSelection,
    Ready,
}

impl WizardStep {
    pub fn next(self) -> Self {
        match self {
            WizardStep::Welcome => WizardStep::MediaSelection,
            WizardStep::MediaSelection => WizardStep::Ready,
            WizardStep::Ready => WizardStep::Ready,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            WizardStep::Welcome => WizardStep::Welcome,
            WizardStep::MediaSelection => WizardStep::Welcome,
            WizardStep::Ready => WizardStep::MediaSelection,
        }
    }

    pub fn index(self) -> usize {
        match self {
            WizardStep::Welcome => 0,
            WizardStep::MediaSelection => 1,
            WizardStep::Ready => 2,
        }
    }

    pub fn total() -> usize {
        3
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Welcome => "Magnet Link",
            WizardStep::MediaSelection => "Media",
            WizardStep::Ready => "Ready",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub identifier: String,
    pub selected_path: Option<String>,
    pub candidates: Vec<MediaCandidate>,
    /// Derived from `candidates` minus the selected file.
    pub subtitle_candidates: Vec<SubtitleCandidate>,
}

/// Everything a playback session needs from the wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub identifier: String,
    pub selected_path: String,
    pub title: String,
    pub description: String,
    pub subtitles: Vec<SubtitleCandidate>,
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    Input(char),
    Backspace,
    Paste(String),
    ClearInput,
    Submit,
    LookupSucceeded { identifier: String, info: BundleInfo },
    LookupFailed { identifier: String, error: String },
    CursorUp,
    CursorDown,
    SelectCandidate,
    ToggleRightsConfirmation,
    Next,
    Back,
    DismissNotice,
    Play,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEffect {
    StartLookup(String),
    StartSession(SessionRequest),
}

#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub step: WizardStep,
    pub selection: SelectionState,
    pub bundle_name: String,
    pub description: String,
    /// Highlighted row in the media list.
    pub cursor: usize,
    pub rights_confirmed: bool,
    pub lookup_in_flight: bool,
    pub notice: Option<String>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_enabled(&self) -> bool {
        !self.lookup_in_flight
    }

    pub fn selected_candidate(&self) -> Option<&MediaCandidate> {
        let selected = self.selection.selected_path.as_deref()?;
        self.selection.candidates.iter().find(|c| c.path == selected)
    }

    pub fn can_advance(&self) -> bool {
        match self.step {
            WizardStep::Welcome => {
                self.entry_enabled() && !self.selection.identifier.trim().is_empty()
            }
            WizardStep::MediaSelection => self.selection.selected_path.is_some(),
            WizardStep::Ready => false,
        }
    }

    pub fn can_play(&self) -> bool {
        self.step == WizardStep::Ready
            && self.selection.selected_path.is_some()
            && self.rights_confirmed
    }

    pub fn apply(&mut self, event: WizardEvent) -> Vec<WizardEffect> {
        match event {
            WizardEvent::Input(c) => self.edit_identifier(|id| id.push(c)),
            WizardEvent::Backspace => self.edit_identifier(|id| {
                id.pop();
            }),
            WizardEvent::Paste(text) => self.edit_identifier(|id| id.push_str(text.trim())),
            WizardEvent::ClearInput => self.edit_identifier(String::clear),
            WizardEvent::Submit => return self.submit(),
            WizardEvent::LookupSucceeded { identifier, info } => {
                self.lookup_succeeded(&identifier, info)
            }
            WizardEvent::LookupFailed { identifier, error } => {
                if self.is_current_lookup(&identifier) {
                    warn!(error = %error, "magnet lookup failed");
                    self.lookup_in_flight = false;
                    self.notice = Some(LOOKUP_FAILED_NOTICE.to_string());
                }
            }
            WizardEvent::CursorUp => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            WizardEvent::CursorDown => {
                let len = self.selection.candidates.len();
                if len > 0 {
                    self.cursor = (self.cursor + 1).min(len - 1);
                }
            }
            WizardEvent::SelectCandidate => self.select_at_cursor(),
            WizardEvent::ToggleRightsConfirmation => {
                if self.step == WizardStep::Ready {
                    self.rights_confirmed = !self.rights_confirmed;
                }
            }
            WizardEvent::Next => match self.step {
                WizardStep::Welcome => return self.submit(),
                WizardStep::MediaSelection if self.can_advance() => {
                    self.step = self.step.next();
                }
                _ => {}
            },
            WizardEvent::Back => self.back(),
            WizardEvent::DismissNotice => self.notice = None,
            WizardEvent::Play => {
                if let Some(request) = self.session_request() {
                    info!(path = %request.selected_path, "starting playback");
                    return vec![WizardEffect::StartSession(request)];
                }
            }
        }

        Vec::new()
    }

    fn edit_identifier(&mut self, edit: impl FnOnce(&mut String)) {
        if self.step != WizardStep::Welcome || !self.entry_enabled() {
            return;
        }
        edit(&mut self.selection.identifier);
        self.clear_selection();
    }

    fn submit(&mut self) -> Vec<WizardEffect> {
        if self.step != WizardStep::Welcome || !self.can_advance() {
            return Vec::new();
        }

        self.lookup_in_flight = true;
        self.notice = None;
        vec![WizardEffect::StartLookup(
            self.selection.identifier.trim().to_string(),
        )]
    }

    fn is_current_lookup(&self, identifier: &str) -> bool {
        self.lookup_in_flight && self.selection.identifier.trim() == identifier
    }

    fn lookup_succeeded(&mut self, identifier: &str, info: BundleInfo) {
        if !self.is_current_lookup(identifier) {
            return;
        }

        info!(name = %info.name, files = info.files.len(), "magnet lookup finished");
        self.lookup_in_flight = false;
        self.bundle_name = info.name;
        self.description = description_or_placeholder(info.description.as_bytes());
        self.selection.candidates = info.files.into_iter().map(MediaCandidate::from).collect();
        self.clear_selection();
        self.cursor = 0;
        self.step = WizardStep::MediaSelection;
    }

    fn select_at_cursor(&mut self) {
        if self.step != WizardStep::MediaSelection {
            return;
        }
        let Some(candidate) = self.selection.candidates.get(self.cursor) else {
            return;
        };

        if self.selection.selected_path.as_deref() != Some(candidate.path.as_str()) {
            self.rights_confirmed = false;
        }
        let path = candidate.path.clone();
        self.selection.subtitle_candidates = build_candidates(&self.selection.candidates, &path);
        self.selection.selected_path = Some(path);
    }

    fn clear_selection(&mut self) {
        self.selection.selected_path = None;
        self.selection.subtitle_candidates.clear();
        self.rights_confirmed = false;
    }

    fn back(&mut self) {
        match self.step {
            WizardStep::Welcome => {}
            WizardStep::MediaSelection => {
                self.selection.candidates.clear();
                self.clear_selection();
                self.bundle_name.clear();
                self.description.clear();
                self.cursor = 0;
                self.step = WizardStep::Welcome;
            }
            WizardStep::Ready => self.step = WizardStep::MediaSelection,
        }
    }

    fn session_request(&self) -> Option<SessionRequest> {
        if !self.can_play() {
            return None;
        }
        let selected = self.selection.selected_path.clone()?;

        Some(SessionRequest {
            identifier: self.selection.identifier.trim().to_string(),
            selected_path: selected,
            title: self.bundle_name.clone(),
            description: self.description.clone(),
            subtitles: self.selection.subtitle_candidates.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::BundleFile;

    const MAGNET: &str = "magnet:?xt=urn:btih:abc";

    fn bundle() -> BundleInfo {
        BundleInfo {
            name: "Big Movie".to_string(),
            description: String::new(),
            files: vec![
                BundleFile {
                    path: "Big Movie/a.srt".to_string(),
                    length: 10,
                },
                BundleFile {
                    path: "Big Movie/b.mp4".to_string(),
                    length: 2_000_000_000,
                },
                BundleFile {
                    path: "Big Movie/c.nfo".to_string(),
                    length: 5,
                },
            ],
        }
    }

    fn typed(text: &str) -> WizardState {
        let mut state = WizardState::new();
        state.apply(WizardEvent::Paste(text.to_string()));
        state
    }

    fn at_media_selection() -> WizardState {
        let mut state = typed(MAGNET);
        state.apply(WizardEvent::Submit);
        state.apply(WizardEvent::LookupSucceeded {
            identifier: MAGNET.to_string(),
            info: bundle(),
        });
        state
    }

    fn at_ready() -> WizardState {
        let mut state = at_media_selection();
        state.apply(WizardEvent::CursorDown);
        state.apply(WizardEvent::SelectCandidate);
        state.apply(WizardEvent::Next);
        state
    }

    #[test]
    fn test_submit_requires_identifier() {
        let mut state = WizardState::new();
        assert!(state.apply(WizardEvent::Submit).is_empty());

        let mut state = typed("  ");
        assert!(state.apply(WizardEvent::Submit).is_empty());
        assert_eq!(state.step, WizardStep::Welcome);
    }

    #[test]
    fn test_submit_starts_lookup_and_disables_entry() {
        let mut state = typed(MAGNET);
        let effects = state.apply(WizardEvent::Submit);

        assert_eq!(effects, vec![WizardEffect::StartLookup(MAGNET.to_string())]);
        assert!(!state.entry_enabled());

        // Input is ignored while the lookup runs
        state.apply(WizardEvent::Input('x'));
        assert_eq!(state.selection.identifier, MAGNET);
        assert!(state.apply(WizardEvent::Submit).is_empty());
    }

    #[test]
    fn test_lookup_failure_keeps_entry_enabled() {
        let mut state = typed(MAGNET);
        state.apply(WizardEvent::Submit);
        state.apply(WizardEvent::LookupFailed {
            identifier: MAGNET.to_string(),
            error: "HTTP 500".to_string(),
        });

        assert_eq!(state.step, WizardStep::Welcome);
        assert!(state.entry_enabled());
        assert_eq!(state.notice.as_deref(), Some(LOOKUP_FAILED_NOTICE));
        assert!(state.apply(WizardEvent::Play).is_empty());

        state.apply(WizardEvent::DismissNotice);
        assert_eq!(state.notice, None);
    }

    #[test]
    fn test_lookup_success_moves_to_media_selection() {
        let state = at_media_selection();

        assert_eq!(state.step, WizardStep::MediaSelection);
        assert_eq!(state.bundle_name, "Big Movie");
        assert_eq!(state.description, "No README found.");
        assert_eq!(state.selection.candidates.len(), 3);
        assert_eq!(state.selection.selected_path, None);
        assert!(!state.can_advance());
    }

    #[test]
    fn test_stale_lookup_result_is_ignored() {
        let mut state = typed(MAGNET);
        state.apply(WizardEvent::Submit);
        state.apply(WizardEvent::LookupSucceeded {
            identifier: "magnet:?xt=urn:btih:other".to_string(),
            info: bundle(),
        });

        assert_eq!(state.step, WizardStep::Welcome);
        assert!(state.lookup_in_flight);
    }

    #[test]
    fn test_selecting_derives_subtitle_candidates() {
        let mut state = at_media_selection();
        state.apply(WizardEvent::CursorDown);
        state.apply(WizardEvent::SelectCandidate);

        assert_eq!(
            state.selection.selected_path.as_deref(),
            Some("Big Movie/b.mp4")
        );
        let subtitles: Vec<(String, i8)> = state
            .selection
            .subtitle_candidates
            .iter()
            .map(|c| (c.title(), c.priority))
            .collect();
        assert_eq!(
            subtitles,
            vec![
                ("None".to_string(), -1),
                ("a.srt".to_string(), 0),
                ("c.nfo".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_play_requires_rights_confirmation() {
        let mut state = at_ready();
        assert_eq!(state.step, WizardStep::Ready);
        assert!(state.apply(WizardEvent::Play).is_empty());

        state.apply(WizardEvent::ToggleRightsConfirmation);
        let effects = state.apply(WizardEvent::Play);
        let [WizardEffect::StartSession(request)] = effects.as_slice() else {
            panic!("expected a session request, got {effects:?}");
        };

        assert_eq!(request.identifier, MAGNET);
        assert_eq!(request.selected_path, "Big Movie/b.mp4");
        assert_eq!(request.title, "Big Movie");
        assert_eq!(request.subtitles.len(), 3);
    }

    #[test]
    fn test_changing_selection_resets_rights_confirmation() {
        let mut state = at_ready();
        state.apply(WizardEvent::ToggleRightsConfirmation);
        state.apply(WizardEvent::Back);
        assert_eq!(state.step, WizardStep::MediaSelection);

        // Same file keeps the confirmation
        state.apply(WizardEvent::SelectCandidate);
        assert!(state.rights_confirmed);

        state.apply(WizardEvent::CursorUp);
        state.apply(WizardEvent::SelectCandidate);
        assert!(!state.rights_confirmed);
    }

    #[test]
    fn test_back_navigation() {
        let mut state = at_ready();

        state.apply(WizardEvent::Back);
        assert_eq!(state.step, WizardStep::MediaSelection);
        assert_eq!(state.selection.candidates.len(), 3);
        assert!(state.selection.selected_path.is_some());

        state.apply(WizardEvent::Back);
        assert_eq!(state.step, WizardStep::Welcome);
        assert!(state.selection.candidates.is_empty());
        assert!(state.selection.selected_path.is_none());
        assert_eq!(state.selection.identifier, MAGNET);
    }

    #[test]
    fn test_editing_identifier_clears_selection() {
        let mut state = at_ready();
        state.apply(WizardEvent::Back);
        state.apply(WizardEvent::Back);

        state.selection.selected_path = Some("stale".to_string());
        state.apply(WizardEvent::Backspace);
        assert!(state.selection.selected_path.is_none());
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut state = at_media_selection();
        for _ in 0..10 {
            state.apply(WizardEvent::CursorDown);
        }
        assert_eq!(state.cursor, 2);

        for _ in 0..10 {
            state.apply(WizardEvent::CursorUp);
        }
        assert_eq!(state.cursor, 0);
    }
}
