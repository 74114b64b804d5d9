//! Engine configuration.
//!
//! Every tunable of the engine lives in one [`EngineConfig`]. It can be
//! stored as JSON and is overridden from the environment:
//!
//! - `PDF_ANNOTATOR_RENDER_WORKERS`: render pool size (default: 2)
//! - `PDF_ANNOTATOR_CACHE_MB`: render cache memory budget in MB
//!   (default: detected from the system)
//! - `PDF_ANNOTATOR_FONT`: TrueType font used for text annotations
//! - `PDF_ANNOTATOR_HISTORY_LIMIT`: maximum number of undoable annotations
//!   (default: unbounded)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pdf_annotator_cache::RenderCacheConfig;
use pdf_annotator_core::{LayoutConfig, LocatorConfig, OverlayStyle, PlacementConfig, SaveConfig, ViewportLimits};
use pdf_annotator_scheduler::WorkerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_RENDER_WORKERS: &str = "PDF_ANNOTATOR_RENDER_WORKERS";
pub const ENV_CACHE_MB: &str = "PDF_ANNOTATOR_CACHE_MB";
pub const ENV_FONT: &str = "PDF_ANNOTATOR_FONT";
pub const ENV_HISTORY_LIMIT: &str = "PDF_ANNOTATOR_HISTORY_LIMIT";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse.
    #[error("invalid configuration value for {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Initial size of the on-screen view in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSize {
    pub width: f32,
    pub height: f32,
}

impl Default for ViewSize {
    fn default() -> Self {
        Self { width: 1080.0, height: 1920.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub view: ViewSize,
    pub viewport: ViewportLimits,
    pub layout: LayoutConfig,
    pub locator: LocatorConfig,
    pub placement: PlacementConfig,
    pub overlay: OverlayStyle,
    pub save: SaveConfig,
    pub cache: RenderCacheConfig,
    pub workers: WorkerConfig,
    /// Cap on undoable annotations; the oldest is dropped past it.
    pub history_limit: Option<usize>,
}

impl EngineConfig {
    /// Default location of the configuration file.
    ///
    /// `<config dir>/pdf-annotator/config.json`, or `None` on platforms
    /// without a configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pdf-annotator").join("config.json"))
    }

    /// Defaults with environment overrides applied.
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var(ENV_RENDER_WORKERS) {
            self.workers.render_workers = parse_env(ENV_RENDER_WORKERS, &val)?;
        }

        if let Ok(val) = std::env::var(ENV_CACHE_MB) {
            self.cache.memory_budget_mb = Some(parse_env(ENV_CACHE_MB, &val)?);
        }

        if let Ok(val) = std::env::var(ENV_FONT) {
            if val.trim().is_empty() {
                return Err(ConfigError::InvalidValue(ENV_FONT.to_string()));
            }
            self.save.font_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var(ENV_HISTORY_LIMIT) {
            self.history_limit = Some(parse_env(ENV_HISTORY_LIMIT, &val)?);
        }

        Ok(self)
    }

    /// Loads configuration from a JSON file. Missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saves configuration to a JSON file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The file at `path` if it exists (defaults otherwise), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        base.with_env()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue(name.to_string()))
}
