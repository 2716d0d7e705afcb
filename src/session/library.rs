//! The list of saved recordings and its delete policy.

use std::rc::Rc;

use super::playback::PlaybackSessionController;
use crate::error::{SessionError, StoreError};
use crate::model::{PlaybackTarget, SavedRecording};
use crate::store::RecordingStore;

pub struct RecordingLibrary {
    store: Rc<dyn RecordingStore>,
    recordings: Vec<SavedRecording>,
}

impl RecordingLibrary {
    pub fn new(store: Rc<dyn RecordingStore>) -> Self {
        Self {
            store,
            recordings: Vec::new(),
        }
    }

    pub fn recordings(&self) -> &[SavedRecording] {
        &self.recordings
    }

    pub fn get(&self, id: i64) -> Option<&SavedRecording> {
        self.recordings.iter().find(|r| r.id == id)
    }

    /// Replaces the visible list with what the store holds now.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        self.recordings = self.store.list_recordings().await?;
        tracing::debug!("Library refreshed: {} recordings", self.recordings.len());
        Ok(())
    }

    /// Adds a freshly saved recording to the top of the list.
    pub fn append(&mut self, saved: SavedRecording) {
        self.recordings.retain(|r| r.id != saved.id);
        self.recordings.insert(0, saved);
    }

    /// Playback target for a listed recording.
    pub fn target_for(&self, id: i64) -> Option<PlaybackTarget> {
        self.get(id).map(|recording| {
            PlaybackTarget::for_recording(recording, self.store.playback_url(&recording.source))
        })
    }

    /// Deletes a recording and unloads it from `playback` if it was loaded.
    ///
    /// A recording that is audibly playing is not deleted. A recording the
    /// store no longer knows about is treated as already deleted.
    pub async fn delete(
        &mut self,
        id: i64,
        playback: &mut PlaybackSessionController,
    ) -> Result<(), SessionError> {
        if playback.is_playing_recording(id) {
            tracing::warn!("Refusing to delete recording #{} while it plays", id);
            return Err(SessionError::DeleteWhilePlaying);
        }

        match self.store.delete_recording(id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::debug!("Recording #{} was already gone", id);
            }
            Err(e) => {
                tracing::error!("Failed to delete recording #{}: {}", id, e);
                return Err(e.into());
            }
        }

        self.recordings.retain(|r| r.id != id);
        playback.on_delete(id);
        Ok(())
    }
}
