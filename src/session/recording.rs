//! Recording session state machine.
//!
//! `Idle -> Recording <-> Paused -> Reviewing -> Idle`
//!
//! The controller drives an [`AudioCaptureEngine`], holds the finished take
//! while the user reviews it, and hands it to the store on save. The take's
//! object URL is released on every way out of `Reviewing`.

use chrono::Utc;
use std::mem;
use std::rc::Rc;

use crate::capability::SessionId;
use crate::engine::{AudioCaptureEngine, CaptureEvent};
use crate::error::{CaptureError, SessionError};
use crate::model::{AudioTake, SavedRecording};
use crate::store::{RecordingStore, UploadRequest};

/// State of the capture part of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Paused,
    Finalizing,
}

/// Capture progress as shown to the user.
///
/// `elapsed_ms` never decreases during a capture and only goes back to zero
/// when a new recording starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSession {
    pub state: SessionState,
    pub elapsed_ms: u64,
}

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Finalizing,
    Reviewing,
    Saving,
}

impl RecorderState {
    fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Finalizing => "finalizing",
            Self::Reviewing => "reviewing a take",
            Self::Saving => "saving",
        }
    }
}

enum Phase {
    Idle,
    Capturing(SessionId),
    Reviewing(AudioTake),
    Saving,
}

pub struct RecordingSessionController {
    engine: AudioCaptureEngine,
    store: Rc<dyn RecordingStore>,
    phase: Phase,
    session: CaptureSession,
}

impl RecordingSessionController {
    pub fn new(engine: AudioCaptureEngine, store: Rc<dyn RecordingStore>) -> Self {
        Self {
            engine,
            store,
            phase: Phase::Idle,
            session: CaptureSession::default(),
        }
    }

    pub fn state(&self) -> RecorderState {
        match &self.phase {
            Phase::Idle => RecorderState::Idle,
            Phase::Capturing(_) => match self.session.state {
                SessionState::Paused => RecorderState::Paused,
                SessionState::Finalizing => RecorderState::Finalizing,
                SessionState::Idle | SessionState::Recording => RecorderState::Recording,
            },
            Phase::Reviewing(_) => RecorderState::Reviewing,
            Phase::Saving => RecorderState::Saving,
        }
    }

    pub fn capture_session(&self) -> CaptureSession {
        self.session
    }

    /// The take under review, if any.
    pub fn take(&self) -> Option<&AudioTake> {
        match &self.phase {
            Phase::Reviewing(take) => Some(take),
            _ => None,
        }
    }

    /// Asks for microphone access and starts a fresh recording.
    ///
    /// An unsaved take is discarded first. On any failure the controller
    /// stays idle.
    pub async fn begin_recording(&mut self) -> Result<(), SessionError> {
        match &self.phase {
            Phase::Capturing(_) | Phase::Saving => {
                return Err(self.invalid("start recording"));
            }
            Phase::Reviewing(take) => {
                tracing::info!("Discarding unsaved take {} for a new recording", take.url());
                self.phase = Phase::Idle;
            }
            Phase::Idle => {}
        }

        if let Err(e) = self.engine.request_access().await {
            return self.start_failed(e);
        }
        let session = match self.engine.start().await {
            Ok(session) => session,
            Err(e) => return self.start_failed(e),
        };

        self.session = CaptureSession {
            state: SessionState::Recording,
            elapsed_ms: 0,
        };
        self.phase = Phase::Capturing(session);
        tracing::info!("Recording started");
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state() != RecorderState::Recording {
            tracing::warn!("Ignoring pause while {}", self.state().label());
            return;
        }
        if self.engine.pause() {
            self.session.state = SessionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state() != RecorderState::Paused {
            tracing::warn!("Ignoring resume while {}", self.state().label());
            return;
        }
        if self.engine.resume() {
            self.session.state = SessionState::Recording;
        }
    }

    /// Stops capturing and moves to reviewing the finished take.
    ///
    /// An empty or failed capture returns the controller to idle.
    pub async fn finish(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Capturing(_)) {
            return Err(self.invalid("finish recording"));
        }

        self.session.state = SessionState::Finalizing;
        let result = self.engine.stop().await;
        self.session.state = SessionState::Idle;

        match result {
            Ok(take) => {
                tracing::info!(
                    "Reviewing take: {} bytes after {}ms",
                    take.size_bytes(),
                    self.session.elapsed_ms
                );
                self.phase = Phase::Reviewing(take);
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Idle;
                tracing::error!("Recording could not be finalized: {}", e);
                Err(e.into())
            }
        }
    }

    /// Throws away the current take or capture and returns to idle.
    ///
    /// Safe to call in any state.
    pub fn discard(&mut self) {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Reviewing(take) => {
                tracing::info!("Take discarded ({} bytes)", take.size_bytes());
            }
            Phase::Capturing(session) => {
                self.engine.teardown();
                tracing::info!("Recording abandoned ({})", session);
            }
            Phase::Saving => {
                self.phase = Phase::Saving;
                tracing::warn!("Ignoring discard while a save is in flight");
                return;
            }
            Phase::Idle => {}
        }
        self.session.state = SessionState::Idle;
    }

    /// Uploads the take under review.
    ///
    /// On success the take is released, the controller returns to idle and
    /// the stored recording is returned. On failure the take is kept so the
    /// user can retry without recording again. `&mut self` keeps saves from
    /// overlapping; `SaveInFlight` is only seen after a pending save future
    /// was leaked rather than dropped.
    pub async fn save(&mut self, title: &str) -> Result<SavedRecording, SessionError> {
        let take = match mem::replace(&mut self.phase, Phase::Saving) {
            Phase::Reviewing(take) => take,
            Phase::Saving => return Err(SessionError::SaveInFlight),
            other => {
                self.phase = other;
                return Err(self.invalid("save"));
            }
        };

        let request = UploadRequest::for_take(&take, title, Utc::now());
        tracing::info!("Saving take as {}", request.filename);
        let guard = SaveGuard {
            phase: &mut self.phase,
            take: Some(take),
        };

        match self.store.upload_recording(request).await {
            Ok(saved) => {
                guard.complete();
                tracing::info!("Take saved as recording #{}", saved.id);
                Ok(saved)
            }
            Err(e) => {
                drop(guard);
                tracing::error!("Saving take failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Waits for the next event from the capture engine. Cancel safe.
    pub async fn next_engine_event(&mut self) -> Option<CaptureEvent> {
        self.engine.next_event().await
    }

    /// Applies an engine event. Events for any session other than the
    /// current one are ignored.
    pub fn apply_event(&mut self, event: CaptureEvent) -> Result<(), SessionError> {
        let current = match self.phase {
            Phase::Capturing(session) if session == event.session() => session,
            _ => {
                tracing::debug!("Ignoring capture event for inactive {}", event.session());
                return Ok(());
            }
        };

        match event {
            CaptureEvent::Progress { elapsed_ms, .. } => {
                self.session.elapsed_ms = self.session.elapsed_ms.max(elapsed_ms);
                Ok(())
            }
            CaptureEvent::Failed { error, .. } => {
                self.engine.teardown();
                self.phase = Phase::Idle;
                self.session.state = SessionState::Idle;
                tracing::error!("Recording {} failed: {}", current, error);
                Err(error.into())
            }
        }
    }

    /// Applies every event already queued by the engine.
    pub fn drain_events(&mut self) -> Vec<SessionError> {
        let mut errors = Vec::new();
        while let Some(event) = self.engine.try_next_event() {
            if let Err(e) = self.apply_event(event) {
                errors.push(e);
            }
        }
        errors
    }

    fn start_failed(&mut self, error: CaptureError) -> Result<(), SessionError> {
        self.phase = Phase::Idle;
        self.session.state = SessionState::Idle;
        if error.is_superseded() {
            tracing::debug!("Recording start superseded");
            return Ok(());
        }
        tracing::error!("Failed to start recording: {}", error);
        Err(error.into())
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state().label(),
        }
    }
}

/// Puts the take back into review unless the save completed.
///
/// Covers both a failed upload and the save future being dropped mid-flight.
struct SaveGuard<'a> {
    phase: &'a mut Phase,
    take: Option<AudioTake>,
}

impl SaveGuard<'_> {
    fn complete(mut self) {
        self.take = None;
        *self.phase = Phase::Idle;
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if let Some(take) = self.take.take() {
            *self.phase = Phase::Reviewing(take);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobRegistry;
    use crate::error::{CaptureError, DeviceFault, StoreError};
    use crate::testing::{recording, CaptureProbe, StubCapture, StubStore};
    use std::cell::RefCell;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::Poll;

    struct Rig {
        controller: RecordingSessionController,
        probe: Rc<RefCell<CaptureProbe>>,
        store: Rc<StubStore>,
        blobs: Arc<BlobRegistry>,
    }

    fn rig(payload: Vec<u8>) -> Rig {
        let (backend, probe) = StubCapture::with_payload(payload);
        let blobs = BlobRegistry::new();
        let store = Rc::new(StubStore::default());
        let engine = AudioCaptureEngine::new(Box::new(backend), Arc::clone(&blobs));
        let controller = RecordingSessionController::new(engine, store.clone());
        Rig {
            controller,
            probe,
            store,
            blobs,
        }
    }

    #[tokio::test]
    async fn finished_take_is_held_for_review() {
        let mut rig = rig(vec![0xAB; 500]);

        rig.controller.begin_recording().await.unwrap();
        assert_eq!(rig.controller.state(), RecorderState::Recording);
        rig.controller.finish().await.unwrap();

        assert_eq!(rig.controller.state(), RecorderState::Reviewing);
        assert_eq!(rig.controller.take().unwrap().size_bytes(), 500);
        assert_eq!(rig.probe.borrow().held(), 0);
    }

    #[tokio::test]
    async fn empty_take_returns_to_idle() {
        let mut rig = rig(Vec::new());

        rig.controller.begin_recording().await.unwrap();
        let err = rig.controller.finish().await.unwrap_err();

        assert_eq!(err, SessionError::Capture(CaptureError::EmptyRecording));
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert!(rig.controller.take().is_none());
    }

    #[tokio::test]
    async fn denied_access_stays_idle() {
        let mut rig = rig(vec![1]);
        rig.probe.borrow_mut().deny = Some(DeviceFault::Denied("NotAllowedError".into()));

        let err = rig.controller.begin_recording().await.unwrap_err();

        assert!(matches!(err, SessionError::Capture(CaptureError::Permission(_))));
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.probe.borrow().held(), 0);
    }

    #[tokio::test]
    async fn aborted_start_is_silent_and_stays_idle() {
        let mut rig = rig(vec![1]);
        rig.probe.borrow_mut().deny = Some(DeviceFault::Aborted);

        rig.controller.begin_recording().await.unwrap();

        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.probe.borrow().held(), 0);
        assert!(rig.controller.drain_events().is_empty());
    }

    #[tokio::test]
    async fn discard_revokes_take_exactly_once() {
        let mut rig = rig(vec![1; 64]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();
        let url = rig.controller.take().unwrap().url().to_string();

        rig.controller.discard();
        rig.controller.discard();

        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.blobs.revocation_count(&url), 1);
        assert!(rig.blobs.resolve(&url).is_none());
    }

    #[tokio::test]
    async fn save_returns_stored_recording_and_releases_take() {
        let mut rig = rig(vec![9; 128]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();
        let url = rig.controller.take().unwrap().url().to_string();

        let saved = rig.controller.save("Test").await.unwrap();

        assert_eq!(saved, recording(1, "Test", "recording-X.webm"));
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.blobs.revocation_count(&url), 1);

        let uploads = rig.store.uploads.borrow();
        assert_eq!(uploads[0].bytes.len(), 128);
        assert_eq!(uploads[0].mime_type, "audio/webm");
        assert!(uploads[0].filename.starts_with("recording-"));
        assert!(uploads[0].filename.ends_with(".webm"));
    }

    #[tokio::test]
    async fn failed_save_keeps_take_for_retry() {
        let mut rig = rig(vec![9; 128]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();
        let url = rig.controller.take().unwrap().url().to_string();
        *rig.store.upload_failure.borrow_mut() = Some(StoreError::Upload("503".into()));

        let err = rig.controller.save("Test").await.unwrap_err();

        assert_eq!(err, SessionError::Store(StoreError::Upload("503".into())));
        assert_eq!(rig.controller.state(), RecorderState::Reviewing);
        assert_eq!(rig.blobs.revocation_count(&url), 0);

        rig.controller.save("Test").await.unwrap();
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.blobs.revocation_count(&url), 1);
    }

    #[tokio::test]
    async fn save_requires_a_take() {
        let mut rig = rig(vec![1]);
        assert!(matches!(
            rig.controller.save("Nothing").await,
            Err(SessionError::InvalidState { action: "save", .. })
        ));
        assert_eq!(rig.controller.state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn dropped_save_restores_review() {
        let mut rig = rig(vec![1; 8]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();

        {
            let save = rig.controller.save("Cancelled");
            tokio::pin!(save);
            assert!(poll_once(save.as_mut()).await.is_none());
        }

        assert_eq!(rig.controller.state(), RecorderState::Reviewing);
        assert!(rig.controller.take().is_some());
    }

    #[tokio::test]
    async fn elapsed_time_never_decreases_and_resets_on_new_recording() {
        let mut rig = rig(vec![1; 8]);
        rig.controller.begin_recording().await.unwrap();
        let sink = rig.probe.borrow().last_sink();

        sink.progress(100);
        sink.progress(300);
        sink.progress(200);
        assert!(rig.controller.drain_events().is_empty());
        assert_eq!(rig.controller.capture_session().elapsed_ms, 300);

        rig.controller.pause();
        assert_eq!(rig.controller.state(), RecorderState::Paused);
        rig.controller.resume();
        sink.progress(450);
        rig.controller.drain_events();

        rig.controller.finish().await.unwrap();
        assert_eq!(rig.controller.capture_session().elapsed_ms, 450);
        assert_eq!(rig.controller.capture_session().state, SessionState::Idle);

        sink.progress(9_999);
        rig.controller.drain_events();
        assert_eq!(rig.controller.capture_session().elapsed_ms, 450);

        rig.controller.begin_recording().await.unwrap();
        assert_eq!(rig.controller.capture_session().elapsed_ms, 0);
    }

    #[tokio::test]
    async fn new_recording_discards_unsaved_take() {
        let mut rig = rig(vec![1; 8]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();
        let url = rig.controller.take().unwrap().url().to_string();

        rig.controller.begin_recording().await.unwrap();

        assert_eq!(rig.controller.state(), RecorderState::Recording);
        assert_eq!(rig.blobs.revocation_count(&url), 1);
    }

    #[tokio::test]
    async fn leaked_save_blocks_further_saves() {
        let mut rig = rig(vec![1; 8]);
        rig.controller.begin_recording().await.unwrap();
        rig.controller.finish().await.unwrap();

        let mut save = Box::pin(rig.controller.save("Leaked"));
        assert!(poll_once(save.as_mut()).await.is_none());
        std::mem::forget(save);

        assert_eq!(rig.controller.state(), RecorderState::Saving);
        assert_eq!(
            rig.controller.save("Again").await.unwrap_err(),
            SessionError::SaveInFlight
        );
        rig.controller.discard();
        assert_eq!(rig.controller.state(), RecorderState::Saving);
        assert!(matches!(
            rig.controller.begin_recording().await,
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn stream_failure_returns_to_idle_and_releases_hardware() {
        let mut rig = rig(vec![1; 8]);
        rig.controller.begin_recording().await.unwrap();
        rig.probe
            .borrow()
            .last_sink()
            .fault(DeviceFault::Other("device unplugged".into()));

        let errors = rig.controller.drain_events();

        assert_eq!(errors.len(), 1);
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert_eq!(rig.probe.borrow().held(), 0);
    }

    #[tokio::test]
    async fn pause_outside_recording_is_tolerated() {
        let mut rig = rig(vec![1]);
        rig.controller.pause();
        rig.controller.resume();
        assert_eq!(rig.controller.state(), RecorderState::Idle);
        assert!(rig.controller.finish().await.is_err());
    }

    /// Polls a future once, returning its output if it completed.
    async fn poll_once<F: Future>(mut future: Pin<&mut F>) -> Option<F::Output> {
        std::future::poll_fn(|cx| match future.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready(Some(output)),
            Poll::Pending => Poll::Ready(None),
        })
        .await
    }
}
