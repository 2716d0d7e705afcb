//! Waveform rendering and playback capability contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::error::DeviceFault;

/// Identity of one decode/render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waveform#{}", self.0)
    }
}

/// Events a waveform handle emits (`play|pause|finish|ready|timeupdate|error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveformEvent {
    Play,
    Pause,
    Finish,
    Ready { duration_ms: u64 },
    TimeUpdate { position_ms: u64 },
    Error(DeviceFault),
}

/// Sender handed to a waveform handle, stamped with its context.
#[derive(Debug, Clone)]
pub struct WaveformSink {
    context: ContextId,
    tx: mpsc::UnboundedSender<(ContextId, WaveformEvent)>,
}

impl WaveformSink {
    pub fn new(context: ContextId, tx: mpsc::UnboundedSender<(ContextId, WaveformEvent)>) -> Self {
        Self { context, tx }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn emit(&self, event: WaveformEvent) {
        let _ = self.tx.send((self.context, event));
    }
}

/// Area the waveform is drawn into.
pub trait RenderSurface {
    /// Current layout size as `(width, height)`. Zero until first laid out.
    fn layout_size(&self) -> (u32, u32);

    fn is_sized(&self) -> bool {
        let (width, height) = self.layout_size();
        width > 0 && height > 0
    }
}

/// Appearance options passed through to the waveform capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_wave_color")]
    pub wave_color: String,
    #[serde(default = "default_progress_color")]
    pub progress_color: String,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_wave_color() -> String {
    "#4f4a85".to_string()
}

fn default_progress_color() -> String {
    "#383351".to_string()
}

fn default_height() -> u32 {
    96
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            wave_color: default_wave_color(),
            progress_color: default_progress_color(),
            height: default_height(),
        }
    }
}

/// Factory for waveform handles.
pub trait WaveformBackend {
    fn create(
        &mut self,
        surface: &dyn RenderSurface,
        config: &VisualConfig,
        events: WaveformSink,
    ) -> Result<Box<dyn WaveformHandle>, DeviceFault>;
}

/// One decode/render context.
///
/// `load` starts decoding in the background; completion and failure arrive
/// as `Ready` or `Error` events.
pub trait WaveformHandle {
    fn load(&mut self, url: &str);
    fn play_pause(&mut self);
    fn stop(&mut self);
    /// Seeks to a fraction of the duration in `[0, 1]`.
    fn seek_to(&mut self, fraction: f64);
    fn destroy(&mut self);
}
