// Global configuration management

use crate::engine::{EncodeOptions, EngineSettings, Platform, VideoCodec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transcoder: TranscoderConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Transcoder executable; searched on PATH when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Passed as `-threads N` to every invocation
    #[serde(default)]
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for generated output names (defaults to the source's directory)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub codec: VideoCodec,

    /// Default CRF; the codec's own default when unset
    #[serde(default)]
    pub crf: Option<u32>,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default)]
    pub hardware_acceleration: bool,

    #[serde(default = "default_true_config")]
    pub keep_audio: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append debug logs to ffjob.log in the working directory
    #[serde(default)]
    pub debug_file: bool,
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_true_config() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            codec: VideoCodec::default(),
            crf: None,
            preset: default_preset(),
            hardware_acceleration: false,
            keep_audio: true,
        }
    }
}

impl DefaultsConfig {
    /// Encoder options seeded from the configured defaults
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            codec: self.codec,
            crf: self.crf,
            preset: Some(self.preset.clone()),
            hardware_acceleration: self.hardware_acceleration,
            keep_audio: self.keep_audio,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("ffjob")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("ffjob")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();

            // Best effort: an unwritable config dir still runs on defaults
            if let Err(e) = config.save() {
                tracing::warn!("Could not create default config file: {:#}", e);
                eprintln!(
                    "Using built-in defaults. Run 'ffjob init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }

    /// Engine settings for this config; `transcoder` is the already resolved executable
    pub fn engine_settings(&self, transcoder: Option<PathBuf>) -> EngineSettings {
        EngineSettings {
            transcoder,
            threads: self.transcoder.threads,
            output_dir: self.defaults.output_dir.clone(),
            platform: Platform::current(),
        }
    }
}
