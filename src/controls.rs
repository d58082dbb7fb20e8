use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::media::display_path_without_root;
use crate::player::{
    PlayPause, PlayerCommand, PollSample, ReadyLatch, SeekGuard, format_duration, format_remaining,
};
use crate::subtitles::{SubtitleAction, SubtitleGroup};
use crate::wizard::SessionRequest;

pub const SEEK_STEP: Duration = Duration::from_secs(10);
pub const VOLUME_STEP: f64 = 0.1;

#[derive(Debug, Clone)]
pub enum ControlsEvent {
    Connected,
    Sample(PollSample),
    /// Timer tick from the UI loop; expires the seek guard.
    Tick,
    TogglePlayPause,
    SeekBy { forward: bool },
    /// Pointer positions on the seek bar as a fraction of its width.
    SeekPress(f64),
    SeekDrag(f64),
    SeekRelease(f64),
    HoverSeekBar(bool),
    VolumeUp,
    VolumeDown,
    ToggleFullscreen,
    ToggleSubtitles,
    SubtitleCursorUp,
    SubtitleCursorDown,
    SubtitleSelect,
    SubtitleFetched { index: usize, path: PathBuf },
    SubtitleFailed { index: usize, error: String },
    OpenLocalPrompt,
    LocalPromptInput(char),
    LocalPromptPaste(String),
    LocalPromptBackspace,
    LocalPromptSubmit,
    LocalPromptCancel,
    ToggleDescription,
    CopyMagnet,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlsEffect {
    Send(PlayerCommand),
    FetchSubtitle { index: usize, remote_path: String },
    CopyToClipboard(String),
    /// Something the user has to see; shown on the error surface while the
    /// session keeps running.
    ReportError(String),
    Stop,
}

/// UI-side state of one playback session.
#[derive(Debug)]
pub struct ControlsState {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub identifier: String,
    pub total: Duration,
    pub position: Duration,
    pub seek: SeekGuard,
    pub hovering_seek_bar: bool,
    pub ready: ReadyLatch,
    pub play_pause: PlayPause,
    pub volume: f64,
    pub fullscreen: bool,
    pub subtitles: SubtitleGroup,
    pub subtitle_cursor: usize,
    pub subtitles_open: bool,
    pub description_open: bool,
    /// Path being typed for a manually added subtitle file.
    pub local_prompt: Option<String>,
}

impl ControlsState {
    pub fn new(request: &SessionRequest) -> Self {
        Self {
            title: request.title.clone(),
            subtitle: display_path_without_root(&request.selected_path),
            description: request.description.clone(),
            identifier: request.identifier.clone(),
            total: Duration::ZERO,
            position: Duration::ZERO,
            seek: SeekGuard::default(),
            hovering_seek_bar: false,
            ready: ReadyLatch::default(),
            play_pause: PlayPause::default(),
            volume: 1.0,
            fullscreen: false,
            subtitles: SubtitleGroup::new(request.subtitles.clone()),
            subtitle_cursor: 0,
            subtitles_open: false,
            description_open: false,
            local_prompt: None,
        }
    }

    pub fn is_preparing(&self) -> bool {
        !self.ready.is_ready()
    }

    pub fn elapsed_label(&self) -> String {
        format_duration(self.position)
    }

    pub fn remaining_label(&self) -> String {
        format_remaining(self.total, self.position)
    }

    /// Seek bar fill in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn apply(&mut self, event: ControlsEvent, now: Instant) -> Vec<ControlsEffect> {
        match event {
            ControlsEvent::Connected => {
                return vec![ControlsEffect::Send(PlayerCommand::SetVolume(self.volume))];
            }
            ControlsEvent::Sample(sample) => self.apply_sample(sample),
            ControlsEvent::Tick => self.seek.tick(now, self.hovering_seek_bar),
            ControlsEvent::TogglePlayPause => {
                return vec![ControlsEffect::Send(self.play_pause.toggle())];
            }
            ControlsEvent::SeekBy { forward } => {
                if self.total.is_zero() {
                    return Vec::new();
                }
                let target = if forward {
                    (self.position + SEEK_STEP).min(self.total)
                } else {
                    self.position.saturating_sub(SEEK_STEP)
                };
                self.seek.begin();
                self.seek.release(now);
                return self.seek_to(target);
            }
            ControlsEvent::SeekPress(fraction) => {
                if self.total.is_zero() {
                    return Vec::new();
                }
                self.seek.begin();
                return self.seek_to(self.position_at(fraction));
            }
            ControlsEvent::SeekDrag(fraction) => {
                if self.seek == SeekGuard::Dragging {
                    return self.seek_to(self.position_at(fraction));
                }
            }
            ControlsEvent::SeekRelease(fraction) => {
                if self.seek == SeekGuard::Dragging {
                    self.seek.release(now);
                    return self.seek_to(self.position_at(fraction));
                }
            }
            ControlsEvent::HoverSeekBar(hovering) => self.hovering_seek_bar = hovering,
            ControlsEvent::VolumeUp => return self.set_volume(self.volume + VOLUME_STEP),
            ControlsEvent::VolumeDown => return self.set_volume(self.volume - VOLUME_STEP),
            ControlsEvent::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                return vec![ControlsEffect::Send(PlayerCommand::SetFullscreen(
                    self.fullscreen,
                ))];
            }
            ControlsEvent::ToggleSubtitles => {
                self.subtitles_open = !self.subtitles_open;
                self.subtitle_cursor = self.subtitles.active();
            }
            ControlsEvent::SubtitleCursorUp => {
                self.subtitle_cursor = self.subtitle_cursor.saturating_sub(1);
            }
            ControlsEvent::SubtitleCursorDown => {
                let len = self.subtitles.tracks().len();
                self.subtitle_cursor = (self.subtitle_cursor + 1).min(len.saturating_sub(1));
            }
            ControlsEvent::SubtitleSelect => {
                self.subtitles_open = false;
                return match self.subtitles.select(self.subtitle_cursor) {
                    Some(SubtitleAction::Apply(command)) => vec![ControlsEffect::Send(command)],
                    Some(SubtitleAction::Fetch { index, remote_path }) => {
                        vec![ControlsEffect::FetchSubtitle { index, remote_path }]
                    }
                    None => Vec::new(),
                };
            }
            ControlsEvent::SubtitleFetched { index, path } => {
                if let Some(command) = self.subtitles.fetch_succeeded(index, path) {
                    return vec![ControlsEffect::Send(command)];
                }
            }
            ControlsEvent::SubtitleFailed { index, error } => {
                self.subtitles.fetch_failed(index);
                return vec![ControlsEffect::ReportError(format!(
                    "Could not download subtitle: {}",
                    error
                ))];
            }
            ControlsEvent::OpenLocalPrompt => {
                self.subtitles_open = false;
                self.local_prompt = Some(String::new());
            }
            ControlsEvent::LocalPromptInput(c) => {
                if let Some(prompt) = self.local_prompt.as_mut() {
                    prompt.push(c);
                }
            }
            ControlsEvent::LocalPromptPaste(text) => {
                if let Some(prompt) = self.local_prompt.as_mut() {
                    prompt.push_str(text.trim());
                }
            }
            ControlsEvent::LocalPromptBackspace => {
                if let Some(prompt) = self.local_prompt.as_mut() {
                    prompt.pop();
                }
            }
            ControlsEvent::LocalPromptSubmit => return self.submit_local_prompt(),
            ControlsEvent::LocalPromptCancel => self.local_prompt = None,
            ControlsEvent::ToggleDescription => self.description_open = !self.description_open,
            ControlsEvent::CopyMagnet => {
                return vec![ControlsEffect::CopyToClipboard(self.identifier.clone())];
            }
            ControlsEvent::Stop => return vec![ControlsEffect::Stop],
        }

        Vec::new()
    }

    fn apply_sample(&mut self, sample: PollSample) {
        if self.ready.observe(&sample) {
            info!(duration = %format_duration(sample.duration), "renderer is ready");
        }

        if self.seek.is_seeking() {
            return;
        }
        self.total = sample.duration;
        self.position = sample.position;
    }

    fn position_at(&self, fraction: f64) -> Duration {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.total.mul_f64(fraction)
    }

    fn seek_to(&mut self, target: Duration) -> Vec<ControlsEffect> {
        debug!(target = %format_duration(target), "seeking");
        self.position = target;
        vec![ControlsEffect::Send(PlayerCommand::SeekAbsolute(target))]
    }

    fn set_volume(&mut self, volume: f64) -> Vec<ControlsEffect> {
        self.volume = volume.clamp(0.0, 1.0);
        vec![ControlsEffect::Send(PlayerCommand::SetVolume(self.volume))]
    }

    fn submit_local_prompt(&mut self) -> Vec<ControlsEffect> {
        let Some(input) = self.local_prompt.take() else {
            return Vec::new();
        };
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }

        let path = PathBuf::from(input);
        if !path.is_file() {
            return vec![ControlsEffect::ReportError(format!(
                "No such subtitle file: {}",
                path.display()
            ))];
        }

        vec![ControlsEffect::Send(self.subtitles.add_local(path))]
    }
}
