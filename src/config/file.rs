//! Configuration file management for recdeck.
//!
//! Configuration lives in `~/.config/recdeck/recdeck.toml` and is created
//! with defaults the first time it is needed. Every field has a default, so
//! a partial file is fine.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capability::VisualConfig;

/// Microphone capture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Input device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) in host enumeration order
    /// - device name
    #[serde(default = "default_device")]
    pub device: String,
    /// Preferred capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Captured audio between two progress updates
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_progress_interval_ms() -> u64 {
    100
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// Playback and waveform configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Distance of one skip forward/back
    #[serde(default = "default_skip_ms")]
    pub skip_ms: u64,
    /// Interval between position updates while playing
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Wait before the one retry when the waveform area has no size yet
    #[serde(default = "default_layout_retry_ms")]
    pub layout_retry_ms: u64,
    #[serde(flatten)]
    pub visual: VisualConfig,
}

fn default_skip_ms() -> u64 {
    5000
}

fn default_tick_ms() -> u64 {
    50
}

fn default_layout_retry_ms() -> u64 {
    100
}

impl PlaybackConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn layout_retry(&self) -> Duration {
        Duration::from_millis(self.layout_retry_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            skip_ms: default_skip_ms(),
            tick_ms: default_tick_ms(),
            layout_retry_ms: default_layout_retry_ms(),
            visual: VisualConfig::default(),
        }
    }
}

/// Which backend collaborator keeps saved recordings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database and audio files on this machine
    #[default]
    Local,
    /// Remote recordings server
    Http,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Saved-recording storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Server root for the `http` backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory for the `local` backend; `~` is expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl StoreConfig {
    /// Resolved data directory for the local store.
    ///
    /// # Errors
    /// - If the home directory cannot be determined
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let dir = match self.data_dir.as_deref() {
            Some("~") => home,
            Some(dir) => match dir.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(dir),
            },
            None => home.join(".local").join("share").join("recdeck"),
        };
        Ok(dir)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_url: default_base_url(),
            data_dir: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecdeckConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl RecdeckConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults there first if no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Created default configuration at {}", config_path.display());
            return Ok(config);
        }
        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RecdeckConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Writes configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!("Configuration written to {}", path.display());
        Ok(())
    }
}

/// Path to the config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".config").join("recdeck").join("recdeck.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: RecdeckConfig = toml::from_str(
            r#"
            [audio]
            device = "2"

            [playback]
            skip_ms = 10000
            wave_color = "red"

            [store]
            backend = "http"
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.device, "2");
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.playback.skip_ms, 10000);
        assert_eq!(config.playback.tick_ms, 50);
        assert_eq!(config.playback.visual.wave_color, "red");
        assert_eq!(config.playback.visual.height, 96);
        assert_eq!(config.store.backend, StoreBackend::Http);
        assert_eq!(config.store.base_url, "http://localhost:3000");
    }

    #[test]
    fn empty_file_is_the_default_config() {
        let config: RecdeckConfig = toml::from_str("").unwrap();
        assert_eq!(config, RecdeckConfig::default());
    }

    #[test]
    fn saved_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recdeck.toml");
        let mut config = RecdeckConfig::default();
        config.store.data_dir = Some("/srv/recordings".to_string());

        config.save_to(&path).unwrap();
        assert_eq!(RecdeckConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn data_dir_expands_home() {
        let home = dirs::home_dir().unwrap();
        let mut store = StoreConfig::default();
        assert_eq!(
            store.data_dir().unwrap(),
            home.join(".local/share/recdeck")
        );

        store.data_dir = Some("~/audio".to_string());
        assert_eq!(store.data_dir().unwrap(), home.join("audio"));

        store.data_dir = Some("/tmp/audio".to_string());
        assert_eq!(store.data_dir().unwrap(), PathBuf::from("/tmp/audio"));
    }
}
