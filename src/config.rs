//! Source configuration.
//!
//! Example configuration file content
//! ```toml
//! # Restart from the beginning at end of input
//! looping = false
//! # "unthrottled" (as fast as decoding allows) or "realtime"
//! pacing = "realtime"
//! # Convert non-I420 video to I420; when false such frames are dropped
//! convert_video = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How fast the worker hands frames to the sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Deliver frames as soon as they are decoded
    #[default]
    Unthrottled,
    /// Hold frames until their timestamp is due on the wall clock
    Realtime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub looping: bool,
    pub pacing: Pacing,
    pub convert_video: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            looping: false,
            pacing: Pacing::default(),
            convert_video: true,
        }
    }
}

/// Errors reading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SourceConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
