//! Microphone capture engine.
//!
//! Wraps a [`CaptureBackend`] and owns the reserved hardware for exactly as
//! long as a capture is running. Raw capability faults are classified here;
//! superseded captures are logged and dropped.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::blob::BlobRegistry;
use crate::capability::{CaptureBackend, CaptureSignal, CaptureSink, CaptureStream, SessionId};
use crate::error::CaptureError;
use crate::model::AudioTake;

/// Engine-level capture status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Paused,
}

/// Classified event from the running capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Progress {
        session: SessionId,
        elapsed_ms: u64,
    },
    Failed {
        session: SessionId,
        error: CaptureError,
    },
}

impl CaptureEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Progress { session, .. } | Self::Failed { session, .. } => *session,
        }
    }
}

/// Reserved hardware; released when dropped.
struct HardwareGuard(Box<dyn CaptureStream>);

impl Drop for HardwareGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

struct ActiveCapture {
    session: SessionId,
    stream: HardwareGuard,
    paused: bool,
}

pub struct AudioCaptureEngine {
    backend: Box<dyn CaptureBackend>,
    blobs: Arc<BlobRegistry>,
    active: Option<ActiveCapture>,
    next_session: u64,
    events_tx: mpsc::UnboundedSender<(SessionId, CaptureSignal)>,
    events_rx: mpsc::UnboundedReceiver<(SessionId, CaptureSignal)>,
}

impl AudioCaptureEngine {
    pub fn new(backend: Box<dyn CaptureBackend>, blobs: Arc<BlobRegistry>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            blobs,
            active: None,
            next_session: 0,
            events_tx,
            events_rx,
        }
    }

    /// Probes for microphone access and releases the hardware straight away.
    ///
    /// # Errors
    /// - `Permission` if the user or OS refused access
    /// - `Unsupported` if the host has no capture device
    pub async fn request_access(&mut self) -> Result<(), CaptureError> {
        let mut stream = self
            .backend
            .acquire()
            .await
            .map_err(CaptureError::classify)?;
        stream.release();
        tracing::debug!("Microphone access granted");
        Ok(())
    }

    /// Starts a new capture session.
    ///
    /// # Errors
    /// - `AlreadyCapturing` if a session is running or paused
    /// - Any classified fault from acquiring or starting the stream
    pub async fn start(&mut self) -> Result<SessionId, CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }

        let stream = self
            .backend
            .acquire()
            .await
            .map_err(CaptureError::classify)?;
        let mut stream = HardwareGuard(stream);

        self.next_session += 1;
        let session = SessionId(self.next_session);
        stream
            .0
            .start(CaptureSink::new(session, self.events_tx.clone()))
            .map_err(CaptureError::classify)?;

        tracing::info!("Capture started ({})", session);
        self.active = Some(ActiveCapture {
            session,
            stream,
            paused: false,
        });
        Ok(session)
    }

    /// Pauses the running capture. Returns `false` if there was nothing to pause.
    pub fn pause(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) if !active.paused => {
                active.stream.0.pause();
                active.paused = true;
                tracing::debug!("Capture paused ({})", active.session);
                true
            }
            _ => {
                tracing::warn!("Ignoring pause: no capture is running");
                false
            }
        }
    }

    /// Resumes a paused capture. Returns `false` if nothing was paused.
    pub fn resume(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) if active.paused => {
                active.stream.0.resume();
                active.paused = false;
                tracing::debug!("Capture resumed ({})", active.session);
                true
            }
            _ => {
                tracing::warn!("Ignoring resume: no capture is paused");
                false
            }
        }
    }

    /// Finalizes the capture into a take and releases the hardware.
    ///
    /// # Errors
    /// - `NotCapturing` if no session is active
    /// - `EmptyRecording` if the finished buffer has no bytes
    /// - Any classified fault from finalizing the stream
    pub async fn stop(&mut self) -> Result<AudioTake, CaptureError> {
        let mut active = self.active.take().ok_or(CaptureError::NotCapturing)?;
        let session = active.session;

        let encoded = active.stream.0.finish().await;
        drop(active);
        tracing::debug!("Capture hardware released ({})", session);

        let encoded = encoded.map_err(CaptureError::classify)?;
        if encoded.bytes.is_empty() {
            tracing::warn!("Capture stopped with no audio ({})", session);
            return Err(CaptureError::EmptyRecording);
        }

        let take = AudioTake::new(
            self.blobs
                .create_object_url(encoded.bytes, encoded.mime_type),
        );
        tracing::info!(
            "Capture finished ({}): {} bytes, {}",
            session,
            take.size_bytes(),
            take.mime_type()
        );
        Ok(take)
    }

    /// Abandons any running capture. Safe to call in any state.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Capture torn down ({})", active.session);
        }
    }

    pub fn status(&self) -> CaptureStatus {
        match &self.active {
            None => CaptureStatus::Idle,
            Some(active) if active.paused => CaptureStatus::Paused,
            Some(_) => CaptureStatus::Capturing,
        }
    }

    pub fn session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|active| active.session)
    }

    /// Waits for the next event from the current session.
    ///
    /// Cancel safe: nothing is lost if the future is dropped.
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        loop {
            let (session, signal) = self.events_rx.recv().await?;
            if let Some(event) = self.classify(session, signal) {
                return Some(event);
            }
        }
    }

    /// Returns an already-queued event, if any.
    pub fn try_next_event(&mut self) -> Option<CaptureEvent> {
        while let Ok((session, signal)) = self.events_rx.try_recv() {
            if let Some(event) = self.classify(session, signal) {
                return Some(event);
            }
        }
        None
    }

    /// Turns a raw signal into an event. A fault ends the session and
    /// releases the hardware.
    fn classify(&mut self, session: SessionId, signal: CaptureSignal) -> Option<CaptureEvent> {
        if self.session() != Some(session) {
            tracing::debug!("Dropping {:?} from stale {}", signal, session);
            return None;
        }
        match signal {
            CaptureSignal::Progress { elapsed_ms } => Some(CaptureEvent::Progress {
                session,
                elapsed_ms,
            }),
            CaptureSignal::Fault(fault) => {
                let error = CaptureError::classify(fault);
                if error.is_superseded() {
                    tracing::debug!("Swallowing aborted capture signal ({})", session);
                    return None;
                }
                tracing::error!("Capture failed ({}): {}", session, error);
                self.active = None;
                tracing::debug!("Capture hardware released ({})", session);
                Some(CaptureEvent::Failed { session, error })
            }
        }
    }
}
