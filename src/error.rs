//! Error taxonomy for the recording deck.
//!
//! Capabilities report raw [`DeviceFault`]s. Engines classify those at their
//! boundary into [`CaptureError`] or [`PlaybackError`], and the session
//! controllers decide what reaches the user through [`SessionError`].

use thiserror::Error;

/// Raw failure reported by a capture or waveform capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceFault {
    /// The user or operating system refused access to the device
    #[error("access denied: {0}")]
    Denied(String),

    /// The host has no usable device of the requested kind
    #[error("no capture device available")]
    Unavailable,

    /// The operation was cancelled because a newer one replaced it
    #[error("operation aborted")]
    Aborted,

    /// The resource could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// The resource could not be fetched
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by [`crate::engine::AudioCaptureEngine`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone access was denied: {0}")]
    Permission(String),

    #[error("audio capture is not supported on this host")]
    Unsupported,

    #[error("a capture is already in progress")]
    AlreadyCapturing,

    #[error("no capture is in progress")]
    NotCapturing,

    #[error("the recording is empty")]
    EmptyRecording,

    #[error("capture device error: {0}")]
    Device(String),

    /// Internal only; never shown to the user.
    #[error("capture superseded")]
    Superseded,
}

impl CaptureError {
    /// Maps a raw capability fault onto the capture taxonomy.
    pub fn classify(fault: DeviceFault) -> Self {
        match fault {
            DeviceFault::Denied(reason) => Self::Permission(reason),
            DeviceFault::Unavailable => Self::Unsupported,
            DeviceFault::Aborted => Self::Superseded,
            DeviceFault::Decode(msg) | DeviceFault::Fetch(msg) | DeviceFault::Other(msg) => {
                Self::Device(msg)
            }
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// Errors surfaced by [`crate::engine::PlaybackEngine`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("the waveform area has no size yet")]
    TargetNotSized,

    #[error("the recording could not be decoded: {0}")]
    Format(String),

    #[error("the recording could not be fetched: {0}")]
    Network(String),

    #[error("playback error: {0}")]
    Engine(String),

    /// Internal only; never shown to the user.
    #[error("playback superseded")]
    Superseded,
}

impl PlaybackError {
    /// Maps a raw capability fault onto the playback taxonomy.
    pub fn classify(fault: DeviceFault) -> Self {
        match fault {
            DeviceFault::Aborted => Self::Superseded,
            DeviceFault::Decode(msg) => Self::Format(msg),
            DeviceFault::Fetch(msg) => Self::Network(msg),
            DeviceFault::Denied(msg) | DeviceFault::Other(msg) => Self::Engine(msg),
            DeviceFault::Unavailable => Self::Engine("waveform engine unavailable".to_string()),
        }
    }

    /// Network failures can be retried by loading the same target again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// Errors from the backend collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("recording {0} not found")]
    NotFound(i64),

    #[error("recording store error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Errors returned by the session controllers to the presentation layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("a save is already in progress")]
    SaveInFlight,

    #[error("stop playback before deleting this recording")]
    DeleteWhilePlaying,
}

impl SessionError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Capture(CaptureError::Permission(_)) => {
                "Microphone access was denied. Allow microphone access in your system settings and try again.".to_string()
            }
            Self::Capture(CaptureError::Unsupported) => {
                "Recording is not supported on this device.".to_string()
            }
            Self::Capture(CaptureError::EmptyRecording) => {
                "Recording is empty. Please record again.".to_string()
            }
            Self::Playback(PlaybackError::Format(_)) => {
                "This recording could not be played: the audio format is not supported.".to_string()
            }
            Self::Playback(PlaybackError::Network(_)) => {
                "The recording could not be loaded. Check your connection and try again.".to_string()
            }
            Self::Store(StoreError::Upload(msg)) => format!("Saving failed: {msg}"),
            Self::Store(StoreError::Backend(msg)) => {
                format!("The recording store reported an error: {msg}")
            }
            Self::InvalidState { .. } | Self::SaveInFlight | Self::DeleteWhilePlaying => {
                self.to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_faults_classify_as_superseded() {
        assert!(CaptureError::classify(DeviceFault::Aborted).is_superseded());
        assert!(PlaybackError::classify(DeviceFault::Aborted).is_superseded());
    }

    #[test]
    fn playback_faults_split_into_format_and_network() {
        let format = PlaybackError::classify(DeviceFault::Decode("bad header".into()));
        let network = PlaybackError::classify(DeviceFault::Fetch("refused".into()));

        assert_eq!(format, PlaybackError::Format("bad header".into()));
        assert!(!format.is_retryable());
        assert!(network.is_retryable());
    }

    #[test]
    fn store_failures_show_the_store_message() {
        let err = SessionError::Store(StoreError::Backend(
            "Server error (503): try again later".into(),
        ));
        assert_eq!(
            err.user_message(),
            "The recording store reported an error: Server error (503): try again later"
        );
    }

    #[test]
    fn unclassified_errors_get_generic_text() {
        let err = SessionError::Capture(CaptureError::Device("xrun".into()));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");

        let denied = SessionError::from(CaptureError::Permission("user".into()));
        assert!(denied.user_message().contains("denied"));
    }
}
