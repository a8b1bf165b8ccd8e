// Command-line interface
// Demo binary flags, merged over the JSON config

use crate::buffer::BufferStrategy;
use crate::config::{ConfigError, PresenterConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Copying,
    DirectTransfer,
}

impl From<StrategyArg> for BufferStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Copying => BufferStrategy::Copying,
            StrategyArg::DirectTransfer => BufferStrategy::DirectTransfer,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "frame-presenter")]
#[command(about = "Present software-decoded frames at a fixed rate", long_about = None)]
pub struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Decode width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Decode height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Render ticks per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// How decoded pixels reach the GPU upload
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

impl Cli {
    /// Merge the config file (or defaults) with the flags given
    pub fn resolve(&self) -> Result<PresenterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PresenterConfig::load(path)?,
            None => PresenterConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
        if let Some(strategy) = self.strategy {
            config.buffer_strategy = strategy.into();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "frame-presenter",
            "--width",
            "1920",
            "--height",
            "1080",
            "--fps",
            "30",
            "--strategy",
            "copying",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!((config.width, config.height), (1920, 1080));
        assert_eq!(config.target_fps, 30);
        assert_eq!(config.buffer_strategy, BufferStrategy::Copying);
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        let cli = Cli::parse_from(["frame-presenter"]);
        assert_eq!(cli.resolve().unwrap(), PresenterConfig::default());
    }

    #[test]
    fn test_zero_fps_flag_rejected() {
        let cli = Cli::parse_from(["frame-presenter", "--fps", "0"]);
        assert!(matches!(cli.resolve(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_strategy_value_names() {
        let cli = Cli::parse_from(["frame-presenter", "--strategy", "direct-transfer"]);
        assert_eq!(cli.strategy, Some(StrategyArg::DirectTransfer));
        assert!(Cli::try_parse_from(["frame-presenter", "--strategy", "mmap"]).is_err());
    }
}
