//! Data carried between the engines, the controllers and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::{ObjectUrl, BLOB_SCHEME};

/// One completed, unsaved recording.
///
/// The take owns the object URL of its buffer; dropping the take revokes it.
#[derive(Debug)]
pub struct AudioTake {
    blob: ObjectUrl,
    size_bytes: u64,
}

impl AudioTake {
    pub fn new(blob: ObjectUrl) -> Self {
        let size_bytes = blob.bytes().len() as u64;
        Self { blob, size_bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn mime_type(&self) -> &str {
        self.blob.mime_type()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Object URL the take can be previewed from while it is held.
    pub fn url(&self) -> &str {
        self.blob.as_str()
    }
}

/// A recording persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecording {
    pub id: i64,
    pub title: String,
    /// Stored filename
    pub source: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Where a playback target's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    /// In-memory buffer addressed by an object URL
    Blob(String),
    /// Anything the playback capability can fetch (URL or file path)
    Remote(String),
}

impl ResourceRef {
    pub fn parse(url: impl Into<String>) -> Self {
        let url = url.into();
        if url.starts_with(BLOB_SCHEME) {
            Self::Blob(url)
        } else {
            Self::Remote(url)
        }
    }

    pub fn as_url(&self) -> &str {
        match self {
            Self::Blob(url) | Self::Remote(url) => url,
        }
    }
}

/// The audio loaded, or being loaded, into a playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    /// Saved recording this target plays, if any
    pub recording_id: Option<i64>,
    pub resource: ResourceRef,
    /// Known once the engine reports ready
    pub duration_ms: Option<u64>,
    pub position_ms: u64,
}

impl PlaybackTarget {
    pub fn new(resource: ResourceRef) -> Self {
        Self {
            recording_id: None,
            resource,
            duration_ms: None,
            position_ms: 0,
        }
    }

    /// Target for a saved recording served from `url`.
    pub fn for_recording(recording: &SavedRecording, url: impl Into<String>) -> Self {
        Self {
            recording_id: Some(recording.id),
            ..Self::new(ResourceRef::parse(url))
        }
    }

    /// Target for previewing an unsaved take.
    pub fn for_take(take: &AudioTake) -> Self {
        Self::new(ResourceRef::Blob(take.url().to_string()))
    }

    /// Whether both targets point at the same audio.
    pub fn same_resource(&self, other: &PlaybackTarget) -> bool {
        self.resource == other.resource
    }
}
