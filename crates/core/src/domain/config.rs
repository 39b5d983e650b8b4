//! Configuration management for triband
//!
//! This module provides:
//! - The processor configuration (stream parameters, cascade design)
//! - The persisted equalizer settings, carried as a TOML table
//! - Async load/save to disk

use crate::domain::audio::SampleRate;
use crate::domain::dsp::design::CascadeDesign;
use crate::domain::equalizer::Equalizer;
use crate::domain::settings::ChainSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Audio error: {0}")]
    Audio(#[from] crate::domain::audio::AudioError),
}

/// Stream-level processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessorConfig {
    /// Stream sample rate in Hz
    pub sample_rate: SampleRate,

    /// Frames per processed block
    pub block_size: usize,

    /// How cut filter stages are designed
    #[serde(default)]
    pub cascade: CascadeDesign,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::HZ_48000,
            block_size: 512,
            cascade: CascadeDesign::default(),
        }
    }
}

/// Complete triband configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EqConfig {
    #[serde(default)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    pub settings: ChainSettings,
}

impl EqConfig {
    /// Reject configurations no processor can run with
    pub fn validate(&self) -> Result<()> {
        if self.processor.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build an equalizer consistent with this configuration
    ///
    /// Settings go through [`ChainSettings::sanitized`] first, as a host
    /// parameter layer would.
    pub fn build_equalizer(&self) -> Result<Equalizer> {
        self.validate()?;
        let settings = self.settings.sanitized(self.processor.sample_rate);
        Ok(Equalizer::new(
            &settings,
            self.processor.sample_rate,
            self.processor.cascade,
        )?)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }
}
