use crate::palette::Palette;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RENDERER_LOAD_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
/// In debug builds: loads from .env file first, then the environment
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the conversion and merge collaborators
    pub server_url: String,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Bounded wait for the renderer's one-time initialization
    pub renderer_load_timeout: Duration,
    /// Per-file limit checked before a merge request is sent
    pub max_upload_bytes: u64,
    /// Where merged artifacts are written
    pub output_dir: PathBuf,
    /// Track colors, assigned by list position
    pub palette: Palette,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            renderer_load_timeout: Duration::from_millis(DEFAULT_RENDERER_LOAD_TIMEOUT_MS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            output_dir: default_output_dir(),
            palette: Palette::default(),
        }
    }
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: Dev mode activated - loaded .env file");
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    /// Unset variables fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TRACKMIX_SERVER_URL") {
            config.server_url = url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = parse_u64(&lookup, "TRACKMIX_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(ms) = parse_u64(&lookup, "TRACKMIX_RENDERER_LOAD_TIMEOUT_MS")? {
            config.renderer_load_timeout = Duration::from_millis(ms);
        }

        if let Some(bytes) = parse_u64(&lookup, "TRACKMIX_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }

        if let Some(dir) = lookup("TRACKMIX_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        info!(
            "Config: server {} (output dir {})",
            config.server_url,
            config.output_dir.display()
        );

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
