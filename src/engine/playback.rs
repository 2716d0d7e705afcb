//! Waveform playback engine.
//!
//! Owns the render surface and at most one decode context at a time. Loading
//! a new resource destroys the previous context first, and events stamped
//! with any context other than the current one are dropped.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::capability::{
    ContextId, RenderSurface, VisualConfig, WaveformBackend, WaveformEvent, WaveformHandle,
    WaveformSink,
};
use crate::error::PlaybackError;

/// Classified event from the current decode context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ready {
        context: ContextId,
        duration_ms: u64,
    },
    TimeUpdate {
        context: ContextId,
        position_ms: u64,
    },
    Playing {
        context: ContextId,
    },
    Paused {
        context: ContextId,
    },
    Ended {
        context: ContextId,
    },
    Failed {
        context: ContextId,
        error: PlaybackError,
    },
}

impl PlaybackEvent {
    pub fn context(&self) -> ContextId {
        match self {
            Self::Ready { context, .. }
            | Self::TimeUpdate { context, .. }
            | Self::Playing { context }
            | Self::Paused { context }
            | Self::Ended { context }
            | Self::Failed { context, .. } => *context,
        }
    }
}

/// A live decode context. Destroyed when dropped.
struct ActiveContext {
    id: ContextId,
    handle: Box<dyn WaveformHandle>,
    duration_ms: Option<u64>,
}

impl Drop for ActiveContext {
    fn drop(&mut self) {
        self.handle.destroy();
    }
}

pub struct PlaybackEngine {
    backend: Box<dyn WaveformBackend>,
    surface: Box<dyn RenderSurface>,
    visual: VisualConfig,
    layout_retry: Duration,
    active: Option<ActiveContext>,
    next_context: u64,
    events_tx: mpsc::UnboundedSender<(ContextId, WaveformEvent)>,
    events_rx: mpsc::UnboundedReceiver<(ContextId, WaveformEvent)>,
}

impl PlaybackEngine {
    /// Creates an engine drawing into `surface`.
    ///
    /// `layout_retry` is how long to wait for the surface to be laid out when
    /// it has no size on the first attempt.
    pub fn new(
        backend: Box<dyn WaveformBackend>,
        surface: Box<dyn RenderSurface>,
        visual: VisualConfig,
        layout_retry: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            surface,
            visual,
            layout_retry,
            active: None,
            next_context: 0,
            events_tx,
            events_rx,
        }
    }

    /// Tears down the current context and starts decoding `url` in a new one.
    ///
    /// Returns as soon as decoding has been handed to the capability; the
    /// outcome arrives as a `Ready` or `Failed` event for the returned context.
    ///
    /// # Errors
    /// - `TargetNotSized` if the surface still has no size after one retry
    /// - Any classified fault from creating the context
    pub async fn load(&mut self, url: &str) -> Result<ContextId, PlaybackError> {
        self.teardown();

        if !self.surface.is_sized() {
            tracing::debug!(
                "Render surface not laid out yet, retrying in {:?}",
                self.layout_retry
            );
            tokio::time::sleep(self.layout_retry).await;
            if !self.surface.is_sized() {
                tracing::error!("Render surface still has no size; giving up on {}", url);
                return Err(PlaybackError::TargetNotSized);
            }
        }

        self.next_context += 1;
        let id = ContextId(self.next_context);
        let sink = WaveformSink::new(id, self.events_tx.clone());
        let mut handle = self
            .backend
            .create(self.surface.as_ref(), &self.visual, sink)
            .map_err(PlaybackError::classify)?;
        handle.load(url);

        tracing::info!("Loading {} into {}", url, id);
        self.active = Some(ActiveContext {
            id,
            handle,
            duration_ms: None,
        });
        Ok(id)
    }

    /// Releases the current decode context. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Destroying {}", active.id);
        }
    }

    /// Toggles play/pause. Does nothing before the context is ready.
    pub fn play_pause(&mut self) -> bool {
        match self.ready_context() {
            Some(active) => {
                active.handle.play_pause();
                true
            }
            None => {
                tracing::debug!("Ignoring play/pause before ready");
                false
            }
        }
    }

    /// Stops playback and rewinds. Does nothing before the context is ready.
    pub fn stop(&mut self) -> bool {
        match self.ready_context() {
            Some(active) => {
                active.handle.stop();
                true
            }
            None => {
                tracing::debug!("Ignoring stop before ready");
                false
            }
        }
    }

    /// Seeks to `position_ms`, clamped to the duration.
    ///
    /// Returns the position actually sought to, or `None` before ready.
    pub fn seek(&mut self, position_ms: u64) -> Option<u64> {
        let active = self.ready_context()?;
        let duration_ms = active.duration_ms?;
        let clamped = position_ms.min(duration_ms);
        let fraction = if duration_ms == 0 {
            0.0
        } else {
            clamped as f64 / duration_ms as f64
        };
        active.handle.seek_to(fraction);
        Some(clamped)
    }

    pub fn context(&self) -> Option<ContextId> {
        self.active.as_ref().map(|active| active.id)
    }

    pub fn is_ready(&self) -> bool {
        self.duration_ms().is_some()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.active.as_ref().and_then(|active| active.duration_ms)
    }

    /// Waits for the next event from the current context. Cancel safe.
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        loop {
            let (context, event) = self.events_rx.recv().await?;
            if let Some(event) = self.classify(context, event) {
                return Some(event);
            }
        }
    }

    /// Returns an already-queued event, if any.
    pub fn try_next_event(&mut self) -> Option<PlaybackEvent> {
        while let Ok((context, event)) = self.events_rx.try_recv() {
            if let Some(event) = self.classify(context, event) {
                return Some(event);
            }
        }
        None
    }

    fn ready_context(&mut self) -> Option<&mut ActiveContext> {
        self.active
            .as_mut()
            .filter(|active| active.duration_ms.is_some())
    }

    fn classify(&mut self, context: ContextId, event: WaveformEvent) -> Option<PlaybackEvent> {
        let active = match self.active.as_mut() {
            Some(active) if active.id == context => active,
            _ => {
                tracing::debug!("Dropping {:?} from superseded {}", event, context);
                return None;
            }
        };

        let event = match event {
            WaveformEvent::Ready { duration_ms } => {
                active.duration_ms = Some(duration_ms);
                tracing::debug!("{} ready: {}ms", context, duration_ms);
                PlaybackEvent::Ready {
                    context,
                    duration_ms,
                }
            }
            WaveformEvent::TimeUpdate { position_ms } => PlaybackEvent::TimeUpdate {
                context,
                position_ms,
            },
            WaveformEvent::Play => PlaybackEvent::Playing { context },
            WaveformEvent::Pause => PlaybackEvent::Paused { context },
            WaveformEvent::Finish => PlaybackEvent::Ended { context },
            WaveformEvent::Error(fault) => {
                let error = PlaybackError::classify(fault);
                if error.is_superseded() {
                    tracing::debug!("Swallowing aborted load in {}", context);
                    return None;
                }
                tracing::error!("Playback failed in {}: {}", context, error);
                PlaybackEvent::Failed { context, error }
            }
        };
        Some(event)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
