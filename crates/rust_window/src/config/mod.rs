//! Configuration system
//!
//! Window properties and run loop tuning can be loaded from TOML or RON files.
//! The format is chosen from the file extension.

pub use serde::{Serialize, Deserialize};

use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (`.toml`)
    Toml,
    /// Rusty Object Notation (`.ron`)
    Ron,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration trait
pub trait Config: Serialize + DeserializeOwned + Default {
    /// Parse configuration text in the given format
    fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Serialize configuration to text in the given format
    fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string())),
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }

    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loading configuration from {}", path.display());
        Self::parse(&contents, format)
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.render(ConfigFormat::from_path(path)?)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Run loop tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Capacity of the main-thread work queue
    pub dispatch_capacity: usize,

    /// How often the `{FPS}` title token is refreshed, in milliseconds
    pub title_refresh_ms: u64,

    /// How often native events are polled when no frame is being rendered
    pub poll_hz: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            dispatch_capacity: 32,
            title_refresh_ms: 1000,
            poll_hz: 120,
        }
    }
}

impl Config for LoopConfig {}

impl LoopConfig {
    /// Title refresh period
    pub fn title_refresh(&self) -> Duration {
        Duration::from_millis(self.title_refresh_ms)
    }

    /// Event poll period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(1) / self.poll_hz.max(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_capacity == 0 {
            return Err(ConfigError::Invalid("dispatch_capacity must be at least 1".to_string()));
        }
        if self.title_refresh_ms == 0 {
            return Err(ConfigError::Invalid("title_refresh_ms must be at least 1".to_string()));
        }
        if self.poll_hz == 0 {
            return Err(ConfigError::Invalid("poll_hz must be at least 1".to_string()));
        }
        Ok(())
    }
}
