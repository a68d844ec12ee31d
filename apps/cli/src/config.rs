//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `~/.config/skydrop/config.toml`
//! - Windows: `%APPDATA%/skydrop/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skydrop_protocol::constants::DEFAULT_BASE_URL;
use skydrop_uploader::EngineConfig;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Whole-request timeout in seconds (0 = none).
    #[serde(default)]
    pub request_timeout_secs: u64,

    /// Upload engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_secs: 0,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, creating it if absent.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, creating a default file if absent.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The token is a credential.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Engine settings with command-line overrides applied.
    pub fn engine_with_overrides(
        &self,
        file_concurrency: Option<usize>,
        chunk_concurrency: Option<usize>,
    ) -> EngineConfig {
        let mut engine = self.engine.clone();
        if let Some(n) = file_concurrency {
            engine = engine.with_file_concurrency(n);
        }
        if let Some(n) = chunk_concurrency {
            engine = engine.with_chunk_concurrency(n);
        }
        engine
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("skydrop").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("skydrop")
            .join("config.toml")
    }
}
