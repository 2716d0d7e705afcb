//! REST client for a remote recordings server.
//!
//! Endpoints:
//! - `POST   {base}/api/recordings`      multipart: `audio` file part + `title`
//! - `GET    {base}/api/recordings`      full list, no pagination
//! - `DELETE {base}/api/recordings/{id}`
//! - `GET    {base}/uploads/{filename}`  stored audio

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{RecordingStore, UploadRequest};
use crate::error::StoreError;
use crate::model::SavedRecording;

pub struct HttpRecordingStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecordingStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn recordings_url(&self) -> String {
        format!("{}/api/recordings", self.base_url)
    }
}

#[async_trait(?Send)]
impl RecordingStore for HttpRecordingStore {
    async fn upload_recording(&self, request: UploadRequest) -> Result<SavedRecording, StoreError> {
        let size = request.bytes.len();
        let file_part = reqwest::multipart::Part::bytes(request.bytes)
            .file_name(request.filename.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| StoreError::Upload(format!("Failed to create file part for upload: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("audio", file_part)
            .text("title", request.title.clone());

        let url = self.recordings_url();
        tracing::debug!(
            "Upload:\n  URL: {}\n  Method: POST\n  File: {} ({} bytes, {})\n  Title: {}",
            url,
            request.filename,
            size,
            request.mime_type,
            request.title
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Upload(describe_transport_error(&e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Upload(describe_status(status, &body)));
        }

        let saved: SavedRecording = response
            .json()
            .await
            .map_err(|e| StoreError::Upload(format!("Failed to parse server response: {e}")))?;

        tracing::info!("Recording uploaded: #{} {}", saved.id, saved.source);
        Ok(saved)
    }

    async fn list_recordings(&self) -> Result<Vec<SavedRecording>, StoreError> {
        let response = self
            .client
            .get(self.recordings_url())
            .send()
            .await
            .map_err(|e| StoreError::Backend(describe_transport_error(&e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(describe_status(status, &body)));
        }

        let recordings: Vec<SavedRecording> = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to parse recordings list: {e}")))?;
        tracing::debug!("Fetched {} recordings", recordings.len());
        Ok(recordings)
    }

    async fn delete_recording(&self, id: i64) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.recordings_url()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(describe_transport_error(&e)))?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!("Recording #{} deleted", id);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Backend(describe_status(status, &body)))
            }
        }
    }

    fn playback_url(&self, source: &str) -> String {
        format!("{}/uploads/{}", self.base_url, urlencoding::encode(source))
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_connect() {
        "Failed to connect to the recordings server. Check that it is running.".to_string()
    } else if err.is_timeout() {
        "Request to the recordings server timed out.".to_string()
    } else {
        format!("Network error: {err}")
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    match status.as_u16() {
        400 => format!("The server rejected the request: {body}"),
        413 => "The recording is too large for the server.".to_string(),
        500 | 502 | 503 | 504 => {
            "The recordings server is experiencing issues. Please try again later.".to_string()
        }
        _ => format!("Server error (status {status}): {body}"),
    }
}
