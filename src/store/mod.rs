//! Backend collaborator for saved recordings.
//!
//! The session controllers only see the [`RecordingStore`] trait. Two
//! implementations are provided: a REST client for a remote recordings
//! server and a local SQLite + filesystem store with the same layout.

pub mod http;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::rc::Rc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::model::{AudioTake, SavedRecording};

pub use http::HttpRecordingStore;
pub use local::LocalRecordingStore;

/// Everything needed to persist one take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub title: String,
    pub filename: String,
}

impl UploadRequest {
    /// Builds the upload for `take`, naming the file after `at`.
    pub fn for_take(take: &AudioTake, title: &str, at: DateTime<Utc>) -> Self {
        Self {
            bytes: take.bytes().to_vec(),
            mime_type: take.mime_type().to_string(),
            title: title.trim().to_string(),
            filename: recording_filename(at, take.mime_type()),
        }
    }
}

#[async_trait(?Send)]
pub trait RecordingStore {
    /// Persists a take and returns the stored recording.
    ///
    /// Any non-success answer is reported as `StoreError::Upload`.
    async fn upload_recording(&self, request: UploadRequest) -> Result<SavedRecording, StoreError>;

    /// Lists every saved recording, newest first.
    async fn list_recordings(&self) -> Result<Vec<SavedRecording>, StoreError>;

    /// Deletes a recording. Unknown ids yield `StoreError::NotFound`.
    async fn delete_recording(&self, id: i64) -> Result<(), StoreError>;

    /// Maps a stored filename onto something the playback capability can load.
    fn playback_url(&self, source: &str) -> String;
}

/// Creates the store selected in the configuration.
pub fn create_store(config: &StoreConfig) -> anyhow::Result<Rc<dyn RecordingStore>> {
    let store: Rc<dyn RecordingStore> = match config.backend {
        StoreBackend::Http => Rc::new(HttpRecordingStore::new(&config.base_url)),
        StoreBackend::Local => Rc::new(LocalRecordingStore::open(&config.data_dir()?)?),
    };
    tracing::debug!("Recording store: {:?}", config.backend);
    Ok(store)
}

/// Stored filename for a recording made at `at`: `recording-<timestamp>.<ext>`.
///
/// The timestamp is ISO-8601 in UTC with millisecond precision, with `:` and
/// `.` replaced by `-` so it is safe on every filesystem.
pub fn recording_filename(at: DateTime<Utc>, mime_type: &str) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(&[':', '.'][..], "-");
    format!("recording-{stamp}.{}", extension_for(mime_type))
}

/// File extension for an audio MIME type. Codec parameters are ignored.
pub fn extension_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/aac" | "audio/x-m4a" => "m4a",
        _ => "webm",
    }
}
