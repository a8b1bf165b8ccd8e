// Presenter configuration
// Stream resolution, target rate and buffer strategy, loadable from JSON

use crate::buffer::{BufferStrategy, FrameDimensions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    /// Negotiated decode width
    pub width: u32,
    /// Negotiated decode height
    pub height: u32,
    /// Render ticks per second, also the bench report window
    pub target_fps: u32,
    pub buffer_strategy: BufferStrategy,
    /// Rate of the synthetic frame producer in the demo binary
    pub source_fps: u32,
    /// Initial window title
    pub title: String,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            target_fps: 60,
            buffer_strategy: BufferStrategy::default(),
            source_fps: 60,
            title: "Frame Presenter".to_string(),
        }
    }
}

impl PresenterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target_fps must be at least 1".to_string()));
        }
        if self.source_fps == 0 {
            return Err(ConfigError::Invalid("source_fps must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn frame_dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }
}
