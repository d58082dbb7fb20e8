use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::gateway::{GatewayClient, GatewayError};
use crate::media::{MediaCandidate, display_path_without_root, is_subtitle_file, subtitle_language};
use crate::player::PlayerCommand;

#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("subtitle download failed with HTTP {0}")]
    Status(StatusCode),
    #[error("subtitle path '{0}' has no file name")]
    InvalidPath(String),
    #[error("failed to save subtitle: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Subtitles off.
    None,
    /// A file inside the bundle, fetched from the gateway when picked.
    Bundle { path: String, size_bytes: u64 },
    /// A file the user pointed at on disk.
    Local { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCandidate {
    pub source: TrackSource,
    /// -1 for "None", 0 for known subtitle formats, 1 for anything else,
    /// 2 for manually added files.
    pub priority: i8,
}

impl SubtitleCandidate {
    pub fn none() -> Self {
        Self {
            source: TrackSource::None,
            priority: -1,
        }
    }

    pub fn title(&self) -> String {
        match &self.source {
            TrackSource::None => "None".to_string(),
            TrackSource::Bundle { path, .. } => display_path_without_root(path),
            TrackSource::Local { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match (&self.source, self.priority) {
            (TrackSource::None, _) => "Disable subtitles",
            (TrackSource::Local { .. }, _) => "Manually added",
            (TrackSource::Bundle { .. }, 0) => "Integrated subtitle",
            (TrackSource::Bundle { .. }, _) => "Extra file from media",
        }
    }

    pub fn language(&self) -> Option<&'static str> {
        match &self.source {
            TrackSource::None => None,
            TrackSource::Bundle { path, .. } => subtitle_language(path),
            TrackSource::Local { path } => subtitle_language(&path.to_string_lossy()),
        }
    }
}

/// Every bundle file except the one being played, known subtitle formats
/// first, with "None" at the top.
pub fn build_candidates(files: &[MediaCandidate], selected_path: &str) -> Vec<SubtitleCandidate> {
    let mut candidates: Vec<SubtitleCandidate> = files
        .iter()
        .filter(|file| file.path != selected_path)
        .map(|file| SubtitleCandidate {
            priority: if is_subtitle_file(&file.path) { 0 } else { 1 },
            source: TrackSource::Bundle {
                path: file.path.clone(),
                size_bytes: file.size_bytes,
            },
        })
        .collect();

    candidates.insert(0, SubtitleCandidate::none());
    // Stable, so bundle order is kept within a priority
    candidates.sort_by_key(|c| c.priority);
    candidates
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleAction {
    Apply(PlayerCommand),
    /// Download the track first; report back with
    /// [`SubtitleGroup::fetch_succeeded`] or [`SubtitleGroup::fetch_failed`].
    Fetch { index: usize, remote_path: String },
}

/// A set of mutually exclusive subtitle tracks with exactly one active.
#[derive(Debug, Clone)]
pub struct SubtitleGroup {
    tracks: Vec<SubtitleCandidate>,
    active: usize,
    pending: Option<usize>,
}

impl SubtitleGroup {
    pub fn new(mut tracks: Vec<SubtitleCandidate>) -> Self {
        if tracks.first().map(|t| &t.source) != Some(&TrackSource::None) {
            tracks.retain(|t| t.source != TrackSource::None);
            tracks.insert(0, SubtitleCandidate::none());
        }

        Self {
            tracks,
            active: 0,
            pending: None,
        }
    }

    pub fn tracks(&self) -> &[SubtitleCandidate] {
        &self.tracks
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_track(&self) -> &SubtitleCandidate {
        &self.tracks[self.active]
    }

    /// Track currently being downloaded, if any.
    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn select(&mut self, index: usize) -> Option<SubtitleAction> {
        let track = self.tracks.get(index)?;

        match &track.source {
            TrackSource::None => {
                self.active = index;
                self.pending = None;
                Some(SubtitleAction::Apply(PlayerCommand::ClearSubtitles))
            }
            TrackSource::Local { path } => {
                let command = PlayerCommand::SetSubtitleFile(path.clone());
                self.active = index;
                self.pending = None;
                Some(SubtitleAction::Apply(command))
            }
            TrackSource::Bundle { path, .. } => {
                let remote_path = path.clone();
                self.pending = Some(index);
                Some(SubtitleAction::Fetch { index, remote_path })
            }
        }
    }

    /// The download for `index` landed at `local_path`. Returns `None` when
    /// the user has picked something else in the meantime.
    pub fn fetch_succeeded(&mut self, index: usize, local_path: PathBuf) -> Option<PlayerCommand> {
        if self.pending != Some(index) {
            debug!(index, "ignoring subtitle download that is no longer wanted");
            return None;
        }

        self.pending = None;
        self.active = index;
        Some(PlayerCommand::SetSubtitleFile(local_path))
    }

    /// The previously active track stays active.
    pub fn fetch_failed(&mut self, index: usize) {
        if self.pending == Some(index) {
            self.pending = None;
        }
    }

    pub fn add_local(&mut self, path: PathBuf) -> PlayerCommand {
        self.tracks.push(SubtitleCandidate {
            source: TrackSource::Local { path: path.clone() },
            priority: 2,
        });
        self.active = self.tracks.len() - 1;
        self.pending = None;
        PlayerCommand::SetSubtitleFile(path)
    }
}

/// Download `remote_path` from the bundle into `dir`, keeping its file name.
pub async fn fetch_subtitle(
    gateway: &GatewayClient,
    magnet: &str,
    remote_path: &str,
    dir: &Path,
) -> Result<PathBuf, SubtitleError> {
    let file_name = Path::new(remote_path)
        .file_name()
        .ok_or_else(|| SubtitleError::InvalidPath(remote_path.to_string()))?;
    let target = dir.join(file_name);

    let url = gateway.stream_url(magnet, remote_path)?;
    debug!(path = remote_path, "downloading subtitle");

    let mut response = gateway.get(&url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SubtitleError::Status(status));
    }

    let mut file = tokio::fs::File::create(&target).await?;
    while let Some(chunk) = response.chunk().await.map_err(GatewayError::from)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    info!(path = %target.display(), "subtitle saved");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(path: &str) -> SubtitleCandidate {
        SubtitleCandidate {
            source: TrackSource::Bundle {
                path: path.to_string(),
                size_bytes: 0,
            },
            priority: if is_subtitle_file(path) { 0 } else { 1 },
        }
    }

    fn group() -> SubtitleGroup {
        SubtitleGroup::new(vec![
            SubtitleCandidate::none(),
            bundle("Movie/a.srt"),
            bundle("Movie/c.nfo"),
        ])
    }

    #[test]
    fn test_build_candidates_scenario() {
        let files = vec![
            MediaCandidate::new("a.srt", 10),
            MediaCandidate::new("b.mp4", 1000),
            MediaCandidate::new("c.nfo", 5),
        ];

        let candidates = build_candidates(&files, "b.mp4");
        let summary: Vec<(String, i8)> = candidates
            .iter()
            .map(|c| (c.title(), c.priority))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("None".to_string(), -1),
                ("a.srt".to_string(), 0),
                ("c.nfo".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_uppercase_extension_is_an_extra_file() {
        let files = vec![
            MediaCandidate::new("M/a.SRT", 10),
            MediaCandidate::new("M/b.mp4", 1000),
        ];

        let candidates = build_candidates(&files, "M/b.mp4");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].title(), "a.SRT");
        assert_eq!(candidates[1].priority, 1);
        assert_eq!(candidates[1].subtitle(), "Extra file from media");
    }

    #[test]
    fn test_build_candidates_orders_by_priority() {
        let files = vec![
            MediaCandidate::new("Show/info.nfo", 1),
            MediaCandidate::new("Show/ep.mkv", 1),
            MediaCandidate::new("Show/Subs/ep.eng.srt", 1),
            MediaCandidate::new("Show/Subs/ep.ger.ass", 1),
        ];

        let candidates = build_candidates(&files, "Show/ep.mkv");
        let titles: Vec<String> = candidates.iter().map(|c| c.title()).collect();
        assert_eq!(
            titles,
            vec!["None", "Subs/ep.eng.srt", "Subs/ep.ger.ass", "info.nfo"]
        );
        assert!(
            candidates
                .iter()
                .all(|c| c.source != TrackSource::Bundle { path: "Show/ep.mkv".into(), size_bytes: 1 })
        );
        assert_eq!(candidates[1].language(), Some("en"));
        assert_eq!(candidates[1].subtitle(), "Integrated subtitle");
        assert_eq!(candidates[3].subtitle(), "Extra file from media");
    }

    #[test]
    fn test_group_always_starts_with_none() {
        let group = SubtitleGroup::new(vec![bundle("a.srt")]);
        assert_eq!(group.tracks()[0], SubtitleCandidate::none());
        assert_eq!(group.active(), 0);
        assert_eq!(group.active_track().subtitle(), "Disable subtitles");
    }

    #[test]
    fn test_select_none_clears_without_fetch() {
        let mut group = group();
        assert_eq!(
            group.select(0),
            Some(SubtitleAction::Apply(PlayerCommand::ClearSubtitles))
        );
        assert_eq!(group.pending(), None);
    }

    #[test]
    fn test_select_bundle_track_fetches_first() {
        let mut group = group();
        assert_eq!(
            group.select(1),
            Some(SubtitleAction::Fetch {
                index: 1,
                remote_path: "Movie/a.srt".to_string()
            })
        );
        // Not active until the file is on disk
        assert_eq!(group.active(), 0);

        let command = group.fetch_succeeded(1, PathBuf::from("/tmp/s/a.srt"));
        assert_eq!(
            command,
            Some(PlayerCommand::SetSubtitleFile(PathBuf::from("/tmp/s/a.srt")))
        );
        assert_eq!(group.active(), 1);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_track() {
        let mut group = group();
        group.select(1);
        group.fetch_succeeded(1, PathBuf::from("/tmp/s/a.srt"));

        group.select(2);
        group.fetch_failed(2);
        assert_eq!(group.active(), 1);
        assert_eq!(group.pending(), None);
    }

    #[test]
    fn test_stale_fetch_is_ignored() {
        let mut group = group();
        group.select(1);
        group.select(0);

        assert_eq!(group.fetch_succeeded(1, PathBuf::from("/tmp/s/a.srt")), None);
        assert_eq!(group.active(), 0);
    }

    #[test]
    fn test_local_file_skips_fetch() {
        let mut group = group();
        let command = group.add_local(PathBuf::from("/home/me/movie.en.srt"));
        assert_eq!(
            command,
            PlayerCommand::SetSubtitleFile(PathBuf::from("/home/me/movie.en.srt"))
        );
        assert_eq!(group.active(), 3);
        assert_eq!(group.active_track().subtitle(), "Manually added");
        assert_eq!(group.active_track().title(), "movie.en.srt");

        group.select(0);
        assert_eq!(
            group.select(3),
            Some(SubtitleAction::Apply(PlayerCommand::SetSubtitleFile(
                PathBuf::from("/home/me/movie.en.srt")
            )))
        );
        assert_eq!(group.active(), 3);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut group = group();
        assert_eq!(group.select(10), None);
        assert_eq!(group.active(), 0);
    }
}
