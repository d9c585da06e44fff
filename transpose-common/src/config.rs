//! Configuration loading for the Transpose service
//!
//! The config file path is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TRANSPOSE_CONFIG` environment variable
//! 3. OS-dependent default location
//!
//! Provider secrets may additionally be overridden through environment
//! variables so deployments can keep them out of the config file. Business
//! logic never reads the environment itself; adapters are constructed from
//! the resolved `Config`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the config file location.
pub const CONFIG_ENV_VAR: &str = "TRANSPOSE_CONFIG";

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite database file path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Base URL used when minting short transpose links.
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,

    /// Minimum number of destination providers that must match for a
    /// transposition to succeed.
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,

    /// Concurrency cap for per-track playlist conversion fan-out.
    #[serde(default = "default_playlist_concurrency")]
    pub playlist_concurrency: usize,

    pub spotify: SpotifyConfig,
    pub apple: AppleConfig,
}

/// Spotify Web API credentials (client-credentials grant).
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Optional pre-issued bearer token, for deployments where an external
    /// scheduler performs the refreshes.
    pub initial_token: Option<String>,
}

/// Apple Music API credentials (self-issued ES256 developer token).
#[derive(Debug, Clone, Deserialize)]
pub struct AppleConfig {
    pub team_id: String,
    pub key_id: String,
    /// Path to the MusicKit `.p8` private key.
    pub private_key_path: PathBuf,
    pub initial_token: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("transpose.db")
}

fn default_link_base_url() -> String {
    "https://transpose.com".to_string()
}

fn default_min_matches() -> usize {
    1
}

fn default_playlist_concurrency() -> usize {
    8
}

/// Resolve the config file path following the priority order above.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    default_config_path()
}

/// OS-dependent default config location.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("transpose").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl Config {
    /// Load configuration from a TOML file and apply environment overrides
    /// for provider secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides for secrets and deployment-specific values.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TRANSPOSE_SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = value;
        }
        if let Ok(value) = std::env::var("TRANSPOSE_SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = value;
        }
        if let Ok(value) = std::env::var("TRANSPOSE_APPLE_TEAM_ID") {
            self.apple.team_id = value;
        }
        if let Ok(value) = std::env::var("TRANSPOSE_APPLE_KEY_ID") {
            self.apple.key_id = value;
        }
        if let Ok(value) = std::env::var("TRANSPOSE_APPLE_PRIVATE_KEY_PATH") {
            self.apple.private_key_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("TRANSPOSE_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("TRANSPOSE_URL_BASE") {
            self.link_base_url = value;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.playlist_concurrency == 0 {
            return Err(Error::Config(
                "playlist_concurrency must be at least 1".to_string(),
            ));
        }
        if self.link_base_url.is_empty() {
            return Err(Error::Config("link_base_url must not be empty".to_string()));
        }
        Ok(())
    }
}
