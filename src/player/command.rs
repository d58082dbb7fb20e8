use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};

use super::ipc::IpcRequest;

/// Properties the controller reads back from the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Duration,
    TimePos,
}

impl Property {
    pub fn name(self) -> &'static str {
        match self {
            Property::Duration => "duration",
            Property::TimePos => "time-pos",
        }
    }
}

/// Everything the controller asks the renderer to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    SetPause(bool),
    /// Volume as a fraction in `[0, 1]`.
    SetVolume(f64),
    SetFullscreen(bool),
    SeekAbsolute(Duration),
    ClearSubtitles,
    SetSubtitleFile(PathBuf),
    GetProperty(Property),
}

impl PlayerCommand {
    pub fn to_request(&self) -> IpcRequest {
        let command: Vec<Value> = match self {
            PlayerCommand::SetPause(paused) => vec![json!("set_property"), json!("pause"), json!(paused)],
            PlayerCommand::SetVolume(fraction) => {
                let fraction = if fraction.is_finite() {
                    fraction.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                vec![json!("set_property"), json!("volume"), json!(fraction * 100.0)]
            }
            PlayerCommand::SetFullscreen(on) => {
                vec![json!("set_property"), json!("fullscreen"), json!(on)]
            }
            PlayerCommand::SeekAbsolute(position) => {
                vec![json!("seek"), json!(position.as_secs()), json!("absolute")]
            }
            PlayerCommand::ClearSubtitles => {
                vec![json!("change-list"), json!("sub-files"), json!("clr")]
            }
            PlayerCommand::SetSubtitleFile(path) => vec![
                json!("change-list"),
                json!("sub-files"),
                json!("set"),
                json!(path.to_string_lossy()),
            ],
            PlayerCommand::GetProperty(property) => {
                vec![json!("get_property"), json!(property.name())]
            }
        };

        IpcRequest::new(command)
    }
}

/// What the play/pause control currently shows. The renderer starts paused,
/// so the control starts out offering "play".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayPause {
    #[default]
    ShowingPlay,
    ShowingPause,
}

impl PlayPause {
    /// Flip the control and return the command that matches the new state.
    pub fn toggle(&mut self) -> PlayerCommand {
        match self {
            PlayPause::ShowingPlay => {
                *self = PlayPause::ShowingPause;
                PlayerCommand::SetPause(false)
            }
            PlayPause::ShowingPause => {
                *self = PlayPause::ShowingPlay;
                PlayerCommand::SetPause(true)
            }
        }
    }

    pub fn is_paused(self) -> bool {
        self == PlayPause::ShowingPlay
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayPause::ShowingPlay => "▶ Play",
            PlayPause::ShowingPause => "⏸ Pause",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(command: PlayerCommand) -> String {
        command.to_request().encode_line().unwrap()
    }

    #[test]
    fn test_set_property_commands() {
        assert_eq!(
            encoded(PlayerCommand::SetPause(false)),
            "{\"command\":[\"set_property\",\"pause\",false]}\n"
        );
        assert_eq!(
            encoded(PlayerCommand::SetFullscreen(true)),
            "{\"command\":[\"set_property\",\"fullscreen\",true]}\n"
        );
        assert_eq!(
            encoded(PlayerCommand::SetVolume(0.5)),
            "{\"command\":[\"set_property\",\"volume\",50.0]}\n"
        );
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(
            encoded(PlayerCommand::SetVolume(3.0)),
            "{\"command\":[\"set_property\",\"volume\",100.0]}\n"
        );
        assert_eq!(
            encoded(PlayerCommand::SetVolume(-1.0)),
            "{\"command\":[\"set_property\",\"volume\",0.0]}\n"
        );
    }

    #[test]
    fn test_seek_truncates_to_whole_seconds() {
        assert_eq!(
            encoded(PlayerCommand::SeekAbsolute(Duration::from_millis(61_900))),
            "{\"command\":[\"seek\",61,\"absolute\"]}\n"
        );
    }

    #[test]
    fn test_subtitle_commands() {
        assert_eq!(
            encoded(PlayerCommand::ClearSubtitles),
            "{\"command\":[\"change-list\",\"sub-files\",\"clr\"]}\n"
        );
        assert_eq!(
            encoded(PlayerCommand::SetSubtitleFile(PathBuf::from("/tmp/subs/a.srt"))),
            "{\"command\":[\"change-list\",\"sub-files\",\"set\",\"/tmp/subs/a.srt\"]}\n"
        );
    }

    #[test]
    fn test_get_property() {
        assert_eq!(
            encoded(PlayerCommand::GetProperty(Property::TimePos)),
            "{\"command\":[\"get_property\",\"time-pos\"]}\n"
        );
    }

    #[test]
    fn test_play_pause_toggle() {
        let mut state = PlayPause::default();
        assert!(state.is_paused());

        assert_eq!(state.toggle(), PlayerCommand::SetPause(false));
        assert_eq!(state, PlayPause::ShowingPause);

        assert_eq!(state.toggle(), PlayerCommand::SetPause(true));
        assert!(state.is_paused());
    }
}
