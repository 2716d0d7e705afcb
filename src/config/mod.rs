//! Configuration management for recdeck.
//!
//! Settings are loaded from a TOML file in the user's config directory.

pub mod file;

pub use file::{
    get_config_path, AudioConfig, PlaybackConfig, RecdeckConfig, StoreBackend, StoreConfig,
};
