use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    NoConfigDir,
    #[error("config file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Connection details for the streaming gateway that resolves magnet links
/// and serves individual files over HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            username: String::new(),
            password: String::new(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://localhost:1337".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    /// Command line used to launch the renderer, e.g. `mpv` or
    /// `flatpak run io.mpv.Mpv`. Discovered at startup when unset.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PlayerConfig {
    pub fn configured_command(&self) -> Option<&str> {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Default, Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub temp_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("tanglecast"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 0 disables logging, 8 is the most verbose.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbosity: default_verbosity(),
        }
    }
}

fn default_verbosity() -> u8 {
    5
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "off",
            1..=3 => "error",
            4 => "warn",
            5 => "info",
            6 => "debug",
            _ => "trace",
        }
    }
}

/// Where the error popup's report action sends the user.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_issues_url")]
    pub issues_url: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            issues_url: default_issues_url(),
        }
    }
}

pub const DEFAULT_ISSUES_URL: &str = "https://github.com/tanglecast/tanglecast/issues";

fn default_issues_url() -> String {
    DEFAULT_ISSUES_URL.to_string()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "tanglecast")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.gateway.url.trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::ValidationError(
                "gateway.url cannot be empty".to_string(),
            ));
        }

        if !is_http_url(url) {
            return Err(ConfigError::ValidationError(
                "gateway.url must start with http:// or https://".to_string(),
            ));
        }

        if !is_http_url(self.report.issues_url.trim()) {
            return Err(ConfigError::ValidationError(
                "report.issues_url must start with http:// or https://".to_string(),
            ));
        }

        if self.player.command.is_some() && self.player.configured_command().is_none() {
            return Err(ConfigError::ValidationError(
                "player.command cannot be blank; remove it to auto-detect mpv".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.gateway.url, "http://localhost:1337");
        assert!(config.player.configured_command().is_none());
        assert_eq!(config.log.verbosity, 5);
        assert_eq!(config.log.default_filter(), "info");
        assert_eq!(config.report.issues_url, DEFAULT_ISSUES_URL);
    }

    #[test]
    fn test_issues_url() {
        let config =
            Config::parse("[report]\nissues_url = \"https://git.example.com/me/fork/issues\"")
                .unwrap();
        assert_eq!(config.report.issues_url, "https://git.example.com/me/fork/issues");

        let err = Config::parse("[report]\nissues_url = \"mailto:me@example.com\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
[gateway]
url = "https://gateway.example.com/"
username = "alice"
password = "secret"

[player]
command = "flatpak run io.mpv.Mpv"
args = ["--hwdec=auto"]

[log]
verbosity = 7
"#,
        )
        .unwrap();

        assert_eq!(config.gateway.username, "alice");
        assert_eq!(
            config.player.configured_command(),
            Some("flatpak run io.mpv.Mpv")
        );
        assert_eq!(config.player.args, vec!["--hwdec=auto".to_string()]);
        assert_eq!(config.log.default_filter(), "trace");
    }

    #[test]
    fn test_rejects_non_http_gateway() {
        let err = Config::parse("[gateway]\nurl = \"ftp://example.com\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_blank_player_command() {
        let err = Config::parse("[player]\ncommand = \"  \"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_verbosity_mapping() {
        let filter = |verbosity| LogConfig { verbosity }.default_filter();
        assert_eq!(filter(0), "off");
        assert_eq!(filter(3), "error");
        assert_eq!(filter(4), "warn");
        assert_eq!(filter(6), "debug");
        assert_eq!(filter(8), "trace");
    }
}
