//! Local recording store using SQLite for metadata and plain files for audio.
//!
//! Layout under the data directory:
//! - `recordings.db` with one row per saved recording
//! - `uploads/<filename>` with the audio payload

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{RecordingStore, UploadRequest};
use crate::error::StoreError;
use crate::model::SavedRecording;

pub struct LocalRecordingStore {
    connection: Mutex<Connection>,
    uploads_dir: PathBuf,
}

impl LocalRecordingStore {
    /// Opens (or creates) the store in `data_dir`.
    ///
    /// # Errors
    /// - If the directories cannot be created
    /// - If the database cannot be opened or migrated
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let uploads_dir = data_dir.join("uploads");
        fs::create_dir_all(&uploads_dir)?;

        let connection = Connection::open(data_dir.join("recordings.db"))?;
        connection.execute(
            "CREATE TABLE IF NOT EXISTS recordings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        tracing::debug!("Local recording store opened at {}", data_dir.display());
        Ok(Self {
            connection: Mutex::new(connection),
            uploads_dir,
        })
    }

    fn row_to_recording(row: &rusqlite::Row<'_>) -> rusqlite::Result<SavedRecording> {
        let timestamp: String = row.get(3)?;
        let created_at = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                rusqlite::Error::InvalidParameterName("Invalid timestamp format".to_string())
            })?;

        Ok(SavedRecording {
            id: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            created_at,
        })
    }
}

#[async_trait(?Send)]
impl RecordingStore for LocalRecordingStore {
    async fn upload_recording(&self, request: UploadRequest) -> Result<SavedRecording, StoreError> {
        if request.bytes.is_empty() {
            return Err(StoreError::Upload("No audio data".to_string()));
        }

        let path = self.uploads_dir.join(&request.filename);
        fs::write(&path, &request.bytes)
            .map_err(|e| StoreError::Upload(format!("Failed to write {}: {e}", path.display())))?;

        let created_at = Utc::now().trunc_subsecs(3);
        let connection = self.connection.lock().unwrap();
        let inserted = connection.execute(
            "INSERT INTO recordings (title, source, created_at) VALUES (?1, ?2, ?3)",
            params![
                request.title,
                request.filename,
                created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
            ],
        );

        if let Err(e) = inserted {
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!("Failed to remove orphaned upload {}: {}", path.display(), cleanup);
            }
            return Err(StoreError::Upload(format!("Failed to save recording: {e}")));
        }

        let saved = SavedRecording {
            id: connection.last_insert_rowid(),
            title: request.title,
            source: request.filename,
            created_at,
        };
        tracing::info!("Recording saved: #{} {}", saved.id, saved.source);
        Ok(saved)
    }

    async fn list_recordings(&self) -> Result<Vec<SavedRecording>, StoreError> {
        let connection = self.connection.lock().unwrap();
        let mut statement = connection.prepare(
            "SELECT id, title, source, created_at FROM recordings ORDER BY created_at DESC, id DESC",
        )?;

        let recordings = statement
            .query_map([], Self::row_to_recording)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recordings)
    }

    async fn delete_recording(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.connection.lock().unwrap();
        let source: Option<String> = connection
            .query_row(
                "SELECT source FROM recordings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let source = source.ok_or(StoreError::NotFound(id))?;
        connection.execute("DELETE FROM recordings WHERE id = ?1", params![id])?;

        let path = self.uploads_dir.join(&source);
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("Failed to delete audio file {}: {}", path.display(), e);
        }
        tracing::info!("Recording #{} deleted", id);
        Ok(())
    }

    fn playback_url(&self, source: &str) -> String {
        self.uploads_dir.join(source).display().to_string()
    }
}
