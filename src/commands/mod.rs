//! Application command handlers for recdeck.
//!
//! # Commands
//! - `record`: Record a take, review it and save it to the store
//! - `list`: Print the saved recordings
//! - `play`: Play a saved recording with transport controls
//! - `delete`: Delete a saved recording
//! - `devices`: List available audio input devices
//! - `logs`: Display recent log entries
//! - `config`: Open configuration file in user's preferred editor

pub mod config;
pub mod delete;
pub mod devices;
pub mod keys;
pub mod list;
pub mod logs;
pub mod play;
pub mod record;

pub use config::handle_config;
pub use delete::handle_delete;
pub use devices::handle_devices;
pub use list::handle_list;
pub use logs::handle_logs;
pub use play::handle_play;
pub use record::handle_record;

use std::sync::Arc;

use crate::blob::BlobRegistry;
use crate::config::RecdeckConfig;
use crate::devices::{TerminalSurface, WavDeck};
use crate::engine::PlaybackEngine;
use crate::session::PlaybackSessionController;

pub(crate) fn load_config() -> anyhow::Result<RecdeckConfig> {
    RecdeckConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {:#}", e);
        e
    })
}

/// A playback controller drawing into the terminal.
pub(crate) fn build_player(
    config: &RecdeckConfig,
    blobs: &Arc<BlobRegistry>,
) -> PlaybackSessionController {
    let engine = PlaybackEngine::new(
        Box::new(WavDeck::new(Arc::clone(blobs), config.playback.tick())),
        Box::new(TerminalSurface),
        config.playback.visual.clone(),
        config.playback.layout_retry(),
    );
    PlaybackSessionController::new(engine)
}
