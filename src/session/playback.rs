//! Playback session state machine.
//!
//! `Stopped -> Loading -> Ready -> Playing <-> PausedPlayback -> Stopped`
//!
//! One target is loaded at a time. Switching targets tears down the previous
//! decode context; stopping keeps the target loaded so it can be played
//! again without reloading. Transport events already queued when the user
//! stops, pauses or restarts belong to the previous run and are discarded.

use std::collections::VecDeque;

use crate::capability::ContextId;
use crate::engine::{PlaybackEngine, PlaybackEvent};
use crate::error::SessionError;
use crate::model::PlaybackTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Loading,
    Ready,
    Playing,
    PausedPlayback,
}

pub struct PlaybackSessionController {
    engine: PlaybackEngine,
    state: PlaybackState,
    target: Option<PlaybackTarget>,
    /// Context the controller is waiting on
    context: Option<ContextId>,
    /// Start playing as soon as the pending load is ready
    autoplay: bool,
    /// Load outcomes pulled off the engine while discarding transport events
    deferred: VecDeque<PlaybackEvent>,
}

impl PlaybackSessionController {
    pub fn new(engine: PlaybackEngine) -> Self {
        Self {
            engine,
            state: PlaybackState::Stopped,
            target: None,
            context: None,
            autoplay: false,
            deferred: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    pub fn position_ms(&self) -> u64 {
        self.target.as_ref().map_or(0, |t| t.position_ms)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.target.as_ref().and_then(|t| t.duration_ms)
    }

    /// Whether the given saved recording is audibly playing right now.
    pub fn is_playing_recording(&self, id: i64) -> bool {
        self.state == PlaybackState::Playing && self.loaded_recording() == Some(id)
    }

    pub fn loaded_recording(&self) -> Option<i64> {
        self.target.as_ref().and_then(|t| t.recording_id)
    }

    /// Plays `target`, loading it first if it is not the one already loaded.
    pub async fn play(&mut self, target: PlaybackTarget) -> Result<(), SessionError> {
        let already_loaded = self.context.is_some()
            && self
                .target
                .as_ref()
                .is_some_and(|current| current.same_resource(&target));
        if already_loaded {
            self.resume_loaded();
            return Ok(());
        }

        if let Some(previous) = self.target.take() {
            tracing::debug!("Replacing playback target {}", previous.resource.as_url());
        }
        self.engine.teardown();
        self.context = None;
        self.state = PlaybackState::Loading;

        match self.engine.load(target.resource.as_url()).await {
            Ok(context) => {
                self.context = Some(context);
                self.target = Some(PlaybackTarget {
                    duration_ms: None,
                    position_ms: 0,
                    ..target
                });
                self.autoplay = true;
                Ok(())
            }
            Err(e) => {
                self.state = PlaybackState::Stopped;
                self.autoplay = false;
                if e.is_superseded() {
                    tracing::debug!("Load superseded");
                    return Ok(());
                }
                tracing::error!("Failed to load {}: {}", target.resource.as_url(), e);
                Err(e.into())
            }
        }
    }

    /// Play/pause button for the loaded target.
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                if self.engine.play_pause() {
                    self.discard_queued_transport();
                    self.state = PlaybackState::PausedPlayback;
                }
            }
            PlaybackState::Loading => self.autoplay = !self.autoplay,
            _ => self.resume_loaded(),
        }
    }

    /// Play/pause button for `target`: pauses it while it plays, otherwise
    /// plays it, loading it first when needed.
    pub async fn play_pause(&mut self, target: PlaybackTarget) -> Result<(), SessionError> {
        let current = self.context.is_some()
            && self
                .target
                .as_ref()
                .is_some_and(|loaded| loaded.same_resource(&target));
        if current && matches!(self.state, PlaybackState::Playing | PlaybackState::Loading) {
            self.toggle();
            return Ok(());
        }
        self.play(target).await
    }

    /// Stops and rewinds, keeping the target loaded.
    pub fn stop(&mut self) {
        if self.context.is_none() {
            return;
        }
        self.engine.stop();
        self.discard_queued_transport();
        self.autoplay = false;
        if let Some(target) = self.target.as_mut() {
            target.position_ms = 0;
        }
        self.state = PlaybackState::Stopped;
        tracing::debug!("Playback stopped");
    }

    /// Skips by `delta_ms` (negative to rewind), clamped to the recording.
    ///
    /// Returns the new position, or `None` if nothing is ready to seek.
    pub fn seek_relative(&mut self, delta_ms: i64) -> Option<u64> {
        let duration = self.engine.duration_ms()?;
        let target = self.target.as_mut()?;
        let wanted = (target.position_ms as i64)
            .saturating_add(delta_ms)
            .clamp(0, duration as i64) as u64;
        let position = self.engine.seek(wanted)?;
        target.position_ms = position;
        Some(position)
    }

    /// Reacts to a recording being deleted.
    ///
    /// If it is the loaded target, playback is forced to stop and the target
    /// is cleared. Returns whether anything changed.
    pub fn on_delete(&mut self, id: i64) -> bool {
        if self.loaded_recording() != Some(id) {
            return false;
        }
        self.engine.stop();
        self.engine.teardown();
        self.target = None;
        self.context = None;
        self.autoplay = false;
        self.state = PlaybackState::Stopped;
        tracing::info!("Unloaded deleted recording #{}", id);
        true
    }

    /// Releases the loaded target entirely.
    pub fn unload(&mut self) {
        self.engine.teardown();
        self.target = None;
        self.context = None;
        self.autoplay = false;
        self.deferred.clear();
        self.state = PlaybackState::Stopped;
    }

    /// Waits for the next event from the playback engine. Cancel safe.
    pub async fn next_engine_event(&mut self) -> Option<PlaybackEvent> {
        if let Some(event) = self.deferred.pop_front() {
            return Some(event);
        }
        self.engine.next_event().await
    }

    /// Applies an engine event. Events for any context other than the one
    /// being waited on are ignored.
    pub fn apply_event(&mut self, event: PlaybackEvent) -> Result<(), SessionError> {
        if self.context != Some(event.context()) {
            tracing::debug!("Ignoring {:?} for inactive context", event);
            return Ok(());
        }

        match event {
            PlaybackEvent::Ready { duration_ms, .. } => {
                if let Some(target) = self.target.as_mut() {
                    target.duration_ms = Some(duration_ms);
                }
                if self.autoplay {
                    self.autoplay = false;
                    if self.engine.play_pause() {
                        self.state = PlaybackState::Playing;
                    }
                } else if self.state == PlaybackState::Loading {
                    self.state = PlaybackState::Ready;
                }
            }
            PlaybackEvent::TimeUpdate { position_ms, .. } => match self.state {
                PlaybackState::Playing | PlaybackState::PausedPlayback | PlaybackState::Ready => {
                    if let Some(target) = self.target.as_mut() {
                        target.position_ms = position_ms;
                    }
                }
                _ => tracing::debug!("Ignoring time update while {:?}", self.state),
            },
            PlaybackEvent::Playing { .. } => {
                if matches!(
                    self.state,
                    PlaybackState::Ready | PlaybackState::PausedPlayback
                ) {
                    self.state = PlaybackState::Playing;
                }
            }
            PlaybackEvent::Paused { .. } => {
                if self.state == PlaybackState::Playing {
                    self.state = PlaybackState::PausedPlayback;
                }
            }
            PlaybackEvent::Ended { .. } => {
                if let Some(target) = self.target.as_mut() {
                    target.position_ms = 0;
                }
                self.state = PlaybackState::Stopped;
                tracing::debug!("Playback finished");
            }
            PlaybackEvent::Failed { error, .. } => {
                self.engine.teardown();
                self.context = None;
                self.autoplay = false;
                self.state = PlaybackState::Stopped;
                return Err(error.into());
            }
        }
        Ok(())
    }

    /// Applies every event already queued by the engine.
    pub fn drain_events(&mut self) -> Vec<SessionError> {
        let mut errors = Vec::new();
        while let Some(event) = self
            .deferred
            .pop_front()
            .or_else(|| self.engine.try_next_event())
        {
            if let Err(e) = self.apply_event(event) {
                errors.push(e);
            }
        }
        errors
    }

    fn resume_loaded(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Loading => self.autoplay = true,
            PlaybackState::Ready | PlaybackState::PausedPlayback | PlaybackState::Stopped => {
                self.discard_queued_transport();
                if self.engine.play_pause() {
                    self.state = PlaybackState::Playing;
                } else if self.context.is_some() {
                    // Still decoding after an early stop.
                    self.autoplay = true;
                    self.state = PlaybackState::Loading;
                }
            }
        }
    }

    /// Drops queued play, pause, time and end events from the current run.
    /// Ready and failure events still get applied later.
    fn discard_queued_transport(&mut self) {
        while let Some(event) = self.engine.try_next_event() {
            match event {
                PlaybackEvent::Ready { .. } | PlaybackEvent::Failed { .. } => {
                    self.deferred.push_back(event)
                }
                _ => tracing::debug!("Discarding queued {:?}", event),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{VisualConfig, WaveformEvent};
    use crate::error::{DeviceFault, PlaybackError};
    use crate::model::{PlaybackTarget, ResourceRef};
    use crate::testing::{recording, StubSurface, StubWaveform, WaveformProbe};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn controller() -> (PlaybackSessionController, Rc<RefCell<WaveformProbe>>) {
        let (backend, probe) = StubWaveform::new();
        let engine = PlaybackEngine::new(
            Box::new(backend),
            Box::new(StubSurface::sized()),
            VisualConfig::default(),
            Duration::from_millis(1),
        );
        (PlaybackSessionController::new(engine), probe)
    }

    fn saved_target(id: i64) -> PlaybackTarget {
        PlaybackTarget::for_recording(
            &recording(id, "take", &format!("recording-{id}.wav")),
            format!("http://host/uploads/recording-{id}.wav"),
        )
    }

    /// Loads `target` and lets the stub report it ready.
    async fn play_ready(
        controller: &mut PlaybackSessionController,
        probe: &Rc<RefCell<WaveformProbe>>,
        target: PlaybackTarget,
        duration_ms: u64,
    ) -> ContextId {
        controller.play(target).await.unwrap();
        let context = *probe.borrow().created.last().unwrap();
        probe
            .borrow()
            .emit(context, WaveformEvent::Ready { duration_ms });
        assert!(controller.drain_events().is_empty());
        context
    }

    #[tokio::test]
    async fn play_loads_then_starts_when_ready() {
        let (mut controller, probe) = controller();

        controller.play(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::Loading);

        let context = probe.borrow().created[0];
        probe
            .borrow()
            .emit(context, WaveformEvent::Ready { duration_ms: 3_000 });
        controller.drain_events();

        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.duration_ms(), Some(3_000));
        assert_eq!(probe.borrow().commands, vec![(context, "play_pause")]);
    }

    #[tokio::test]
    async fn switching_targets_before_ready_keeps_only_the_new_one() {
        let (mut controller, probe) = controller();

        controller.play(saved_target(1)).await.unwrap();
        let first = probe.borrow().created[0];
        controller.play(saved_target(2)).await.unwrap();
        let second = probe.borrow().created[1];

        assert_eq!(probe.borrow().destroyed, vec![first]);
        assert_eq!(probe.borrow().live(), 1);
        assert_eq!(controller.loaded_recording(), Some(2));

        probe
            .borrow()
            .emit(first, WaveformEvent::Ready { duration_ms: 1_000 });
        controller.drain_events();
        assert_eq!(controller.state(), PlaybackState::Loading);

        probe
            .borrow()
            .emit(second, WaveformEvent::Ready { duration_ms: 2_000 });
        controller.drain_events();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.duration_ms(), Some(2_000));
    }

    #[tokio::test]
    async fn stop_keeps_target_for_replay() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 5_000).await;
        probe
            .borrow()
            .emit(context, WaveformEvent::TimeUpdate { position_ms: 1_200 });
        controller.drain_events();
        assert_eq!(controller.position_ms(), 1_200);

        controller.stop();
        probe
            .borrow()
            .emit(context, WaveformEvent::TimeUpdate { position_ms: 1_250 });
        controller.drain_events();

        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.position_ms(), 0);
        assert_eq!(controller.loaded_recording(), Some(1));

        controller.play(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(probe.borrow().created.len(), 1);
    }

    #[tokio::test]
    async fn finish_queued_before_stop_does_not_end_the_replay() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 5_000).await;

        probe.borrow().emit(context, WaveformEvent::Finish);
        controller.stop();
        controller.play(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);

        assert!(controller.drain_events().is_empty());
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn events_queued_before_pause_are_discarded() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 5_000).await;

        probe
            .borrow()
            .emit(context, WaveformEvent::TimeUpdate { position_ms: 900 });
        probe.borrow().emit(context, WaveformEvent::Play);
        controller.toggle();
        controller.drain_events();

        assert_eq!(controller.state(), PlaybackState::PausedPlayback);
        assert_eq!(controller.position_ms(), 0);
    }

    #[tokio::test]
    async fn failure_queued_before_stop_is_still_reported() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 5_000).await;

        probe.borrow().emit(
            context,
            WaveformEvent::Error(DeviceFault::Fetch("reset".to_string())),
        );
        controller.stop();

        assert_eq!(controller.drain_events().len(), 1);
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn toggle_pauses_and_resumes() {
        let (mut controller, probe) = controller();
        play_ready(&mut controller, &probe, saved_target(1), 5_000).await;

        controller.toggle();
        assert_eq!(controller.state(), PlaybackState::PausedPlayback);
        controller.toggle();
        assert_eq!(controller.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn play_pause_reloads_after_a_failure() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 5_000).await;

        controller.play_pause(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::PausedPlayback);
        controller.play_pause(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);

        probe.borrow().emit(
            context,
            WaveformEvent::Error(DeviceFault::Fetch("reset".to_string())),
        );
        assert_eq!(controller.drain_events().len(), 1);
        assert_eq!(controller.state(), PlaybackState::Stopped);

        controller.play_pause(saved_target(1)).await.unwrap();
        assert_eq!(controller.state(), PlaybackState::Loading);
        assert_eq!(probe.borrow().created.len(), 2);
    }

    #[tokio::test]
    async fn seek_relative_clamps_to_recording() {
        let (mut controller, probe) = controller();
        assert_eq!(controller.seek_relative(5_000), None);

        play_ready(&mut controller, &probe, saved_target(1), 8_000).await;

        assert_eq!(controller.seek_relative(5_000), Some(5_000));
        assert_eq!(controller.seek_relative(5_000), Some(8_000));
        assert_eq!(controller.seek_relative(-20_000), Some(0));
        assert_eq!(probe.borrow().seeks, vec![0.625, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn deleting_loaded_recording_clears_target() {
        let (mut controller, probe) = controller();
        play_ready(&mut controller, &probe, saved_target(7), 5_000).await;

        assert!(!controller.on_delete(9));
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.loaded_recording(), Some(7));

        assert!(controller.on_delete(7));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(controller.target().is_none());
        assert_eq!(probe.borrow().live(), 0);
    }

    #[tokio::test]
    async fn ended_rewinds_to_stopped() {
        let (mut controller, probe) = controller();
        let context = play_ready(&mut controller, &probe, saved_target(1), 1_000).await;

        probe.borrow().emit(context, WaveformEvent::Finish);
        controller.drain_events();

        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(controller.position_ms(), 0);
        assert_eq!(controller.loaded_recording(), Some(1));
    }

    #[tokio::test]
    async fn load_failures_surface_and_aborts_do_not() {
        let (mut controller, probe) = controller();
        let target = PlaybackTarget::new(ResourceRef::parse("blob:recdeck/1"));
        controller.play(target.clone()).await.unwrap();
        let context = probe.borrow().created[0];

        probe
            .borrow()
            .emit(context, WaveformEvent::Error(DeviceFault::Aborted));
        assert!(controller.drain_events().is_empty());
        assert_eq!(controller.state(), PlaybackState::Loading);

        probe
            .borrow()
            .emit(context, WaveformEvent::Error(DeviceFault::Decode("not audio".into())));
        let errors = controller.drain_events();

        assert_eq!(
            errors,
            vec![SessionError::Playback(PlaybackError::Format("not audio".into()))]
        );
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert_eq!(probe.borrow().live(), 0);

        // Retrying reloads the same target.
        controller.play(target).await.unwrap();
        assert_eq!(probe.borrow().created.len(), 2);
    }
}
