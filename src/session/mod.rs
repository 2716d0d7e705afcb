//! Session controllers: the state the presentation layer renders from.

pub mod library;
pub mod playback;
pub mod recording;

pub use library::RecordingLibrary;
pub use playback::{PlaybackSessionController, PlaybackState};
pub use recording::{CaptureSession, RecorderState, RecordingSessionController, SessionState};
