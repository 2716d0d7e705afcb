//! Contracts for the third-party capture and waveform capabilities.
//!
//! The engines drive these traits and never look behind them. Every event a
//! capability emits goes through a sink stamped with the identity of the
//! context that produced it, so late events from a replaced context can be
//! recognised and dropped.

pub mod capture;
pub mod waveform;

pub use capture::{
    CaptureBackend, CaptureSignal, CaptureSink, CaptureStream, EncodedAudio, SessionId,
};
pub use waveform::{
    ContextId, RenderSurface, VisualConfig, WaveformBackend, WaveformEvent, WaveformHandle,
    WaveformSink,
};
