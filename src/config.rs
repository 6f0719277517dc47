//! Discovery configuration.
//!
//! Loaded from `~/.config/m3u8scout/config.toml` (or an explicit path),
//! then overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, Result};

/// Everything one discovery run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Page to inspect.
    pub target_url: String,
    /// Wait after navigation for players to initialize.
    pub settle_delay_ms: u64,
    /// Response bodies are truncated to this many characters before scanning.
    pub max_response_body_chars: usize,
    /// Where results are written (only when something was found).
    pub output_file: PathBuf,
    /// Run Chromium without a window.
    pub headless: bool,
    /// Upper bound for page navigation.
    pub navigation_timeout_secs: u64,
    /// Upper bound for each API probe and playlist fetch.
    pub probe_timeout_secs: u64,
    /// How many levels of nested playlists to resolve.
    pub playlist_depth: usize,
    /// Chromium binary to launch instead of the auto-detected one.
    pub chrome_executable: Option<PathBuf>,
    /// User-Agent for probes; defaults to the browser's own.
    pub user_agent: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_url: String::new(),
            settle_delay_ms: 9000,
            max_response_body_chars: 200_000,
            output_file: PathBuf::from("found_m3u8s.json"),
            headless: true,
            navigation_timeout_secs: 60,
            probe_timeout_secs: 15,
            playlist_depth: 1,
            chrome_executable: None,
            user_agent: None,
        }
    }
}

impl DiscoveryConfig {
    /// Default config for `target_url`.
    pub fn for_url(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DiscoveryError::Config(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the per-user config file
    /// is used if present, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            DiscoveryError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| DiscoveryError::Config(format!("invalid TOML in {}: {e}", path.display())))
    }

    /// Reject configs that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.target_url).map_err(|e| {
            DiscoveryError::Config(format!("invalid target URL '{}': {e}", self.target_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DiscoveryError::Config(format!(
                "target URL must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Return the path to the per-user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("m3u8scout")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.settle_delay(), Duration::from_millis(9000));
        assert_eq!(config.max_response_body_chars, 200_000);
        assert_eq!(config.output_file, PathBuf::from("found_m3u8s.json"));
        assert!(config.headless);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(config.probe_timeout(), Duration::from_secs(15));
        assert_eq!(config.playlist_depth, 1);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            DiscoveryConfig::from_toml_str("").unwrap(),
            DiscoveryConfig::default()
        );
    }

    #[test]
    fn partial_toml_overrides() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
settle_delay_ms = 2500
headless = false
output_file = "out/streams.json"
chrome_executable = "/usr/bin/chromium"
"#,
        )
        .unwrap();
        assert_eq!(config.settle_delay_ms, 2500);
        assert!(!config.headless);
        assert_eq!(config.output_file, PathBuf::from("out/streams.json"));
        assert_eq!(
            config.chrome_executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert_eq!(config.max_response_body_chars, 200_000);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = DiscoveryConfig::from_toml_str("settle_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "playlist_depth = 3").unwrap();
        let config = DiscoveryConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.playlist_depth, 3);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(DiscoveryConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn validate_target_url() {
        assert!(DiscoveryConfig::for_url("https://example.com/watch/1")
            .validate()
            .is_ok());
        assert!(DiscoveryConfig::for_url("ftp://example.com").validate().is_err());
        assert!(DiscoveryConfig::for_url("").validate().is_err());
    }
}
