//! Engines that drive the capture and waveform capabilities.
//!
//! Each engine owns its capability exclusively and classifies raw faults
//! before handing events to a controller.

pub mod capture;
pub mod playback;

pub use capture::{AudioCaptureEngine, CaptureEvent, CaptureStatus};
pub use playback::{PlaybackEngine, PlaybackEvent};
