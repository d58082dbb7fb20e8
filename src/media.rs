use crate::gateway::BundleFile;

/// Extensions the renderer can load directly as subtitle tracks.
pub const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".vtt", ".ass"];

pub const MISSING_DESCRIPTION: &str = "No README found.";

/// One file inside a content bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub path: String,
    pub size_bytes: u64,
}

impl MediaCandidate {
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Path with the bundle's root folder dropped.
    pub fn display_title(&self) -> String {
        display_path_without_root(&self.path)
    }

    pub fn size_label(&self) -> String {
        format!("{} MB", self.size_bytes / 1000 / 1000)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl From<BundleFile> for MediaCandidate {
    fn from(file: BundleFile) -> Self {
        Self::new(file.path, file.length)
    }
}

/// "Bundle/Season 1/ep.mkv" -> "Season 1/ep.mkv". Single-component paths are
/// returned as they are.
pub fn display_path_without_root(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        return parts.first().copied().unwrap_or_default().to_string();
    }
    parts[1..].join("/")
}

/// Check if a file is a subtitle file based on extension. The match is
/// case-sensitive: `a.SRT` is not treated as a known format.
pub fn is_subtitle_file(filename: &str) -> bool {
    SUBTITLE_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}

/// Try to extract a language code from a subtitle file name,
/// e.g. "Movie.2024.eng.srt" -> "en".
pub fn subtitle_language(filename: &str) -> Option<&'static str> {
    const LANGUAGES: &[(&[&str], &str)] = &[
        (&["english", "eng", "en"], "en"),
        (&["spanish", "spa", "esp", "es"], "es"),
        (&["french", "fre", "fra", "fr"], "fr"),
        (&["german", "ger", "deu", "de"], "de"),
        (&["italian", "ita", "it"], "it"),
        (&["portuguese", "por", "pt"], "pt"),
        (&["russian", "rus", "ru"], "ru"),
        (&["japanese", "jpn", "ja"], "ja"),
        (&["korean", "kor", "ko"], "ko"),
        (&["chinese", "chi", "zho", "zh"], "zh"),
        (&["dutch", "dut", "nld", "nl"], "nl"),
        (&["swedish", "swe", "sv"], "sv"),
        (&["arabic", "ara", "ar"], "ar"),
    ];

    let name = filename.rsplit('/').next().unwrap_or(filename).to_lowercase();
    // The extension itself is never a language.
    let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);

    // Language tags are usually at the end, so scan tokens from the back.
    let tokens: Vec<&str> = stem
        .split(['.', '_', '-', ' ', '[', ']', '(', ')'])
        .filter(|t| !t.is_empty())
        .collect();

    for token in tokens.into_iter().rev() {
        for (patterns, code) in LANGUAGES {
            if patterns.contains(&token) {
                return Some(*code);
            }
        }
    }

    None
}

/// Bundle descriptions arrive as raw bytes from the gateway; anything blank
/// or not UTF-8 gets the placeholder.
pub fn description_or_placeholder(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) if !text.trim().is_empty() => text.to_string(),
        _ => MISSING_DESCRIPTION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_strips_root() {
        let file = MediaCandidate::new("Big Movie (2024)/Big.Movie.2024.mkv", 1_500_000_000);
        assert_eq!(file.display_title(), "Big.Movie.2024.mkv");

        let nested = MediaCandidate::new("Show/Season 1/ep01.mkv", 0);
        assert_eq!(nested.display_title(), "Season 1/ep01.mkv");

        let single = MediaCandidate::new("movie.mkv", 0);
        assert_eq!(single.display_title(), "movie.mkv");
    }

    #[test]
    fn test_size_label_uses_decimal_megabytes() {
        assert_eq!(MediaCandidate::new("a", 1_500_000_000).size_label(), "1500 MB");
        assert_eq!(MediaCandidate::new("a", 999_999).size_label(), "0 MB");
    }

    #[test]
    fn test_is_subtitle_file() {
        assert!(is_subtitle_file("movie.srt"));
        assert!(is_subtitle_file("Movie.English.vtt"));
        assert!(is_subtitle_file("movie.ass"));

        assert!(!is_subtitle_file("Movie.English.VTT"));
        assert!(!is_subtitle_file("movie.SRT"));

        assert!(!is_subtitle_file("movie.sub"));
        assert!(!is_subtitle_file("movie.mkv"));
        assert!(!is_subtitle_file("movie.nfo"));
    }

    #[test]
    fn test_subtitle_language() {
        assert_eq!(subtitle_language("Movie.2024.eng.srt"), Some("en"));
        assert_eq!(subtitle_language("Subs/Movie.2024.English.srt"), Some("en"));
        assert_eq!(subtitle_language("Movie.2024.fre.srt"), Some("fr"));
        assert_eq!(subtitle_language("Movie_2024_jpn.ass"), Some("ja"));

        assert_eq!(subtitle_language("Movie.2024.srt"), None);
        assert_eq!(subtitle_language("Movie.2024.forced.srt"), None);
        assert_eq!(subtitle_language("Frozen.srt"), None);
    }

    #[test]
    fn test_description_placeholder() {
        assert_eq!(description_or_placeholder(b"  \n"), MISSING_DESCRIPTION);
        assert_eq!(description_or_placeholder(&[0xff, 0xfe]), MISSING_DESCRIPTION);
        assert_eq!(description_or_placeholder(b"Release notes"), "Release notes");
    }
}
