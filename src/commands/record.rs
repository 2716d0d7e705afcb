//! Interactive recording with take review and save.
//!
//! Supports an external finish trigger via SIGUSR1.

use chrono::Local;
use std::rc::Rc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::keys::{capture_key, finish_signal, review_key, CaptureKey, KeyReader, ReviewKey};
use super::{build_player, load_config};
use crate::blob::BlobRegistry;
use crate::devices::CpalCapture;
use crate::engine::{AudioCaptureEngine, CaptureEvent, PlaybackEvent};
use crate::error::SessionError;
use crate::model::{PlaybackTarget, SavedRecording};
use crate::session::{PlaybackSessionController, RecorderState, RecordingSessionController};
use crate::store::create_store;
use crate::ui::{DeckScreen, Progress, View};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

enum Outcome {
    Saved(SavedRecording),
    Closed,
    Failed(SessionError),
}

enum Input {
    Capture(CaptureEvent),
    Preview(PlaybackEvent),
    Key(crossterm::event::KeyEvent),
    Redraw,
}

/// Records one take, lets the user review it and saves it on request.
///
/// Prints the saved recording's id on success.
pub async fn handle_record(title: Option<String>) -> anyhow::Result<()> {
    tracing::info!("=== recdeck recorder started ===");
    let config = load_config()?;
    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, store={}",
        config.audio.device,
        config.audio.sample_rate,
        config.store.backend
    );

    let blobs = BlobRegistry::new();
    let store = create_store(&config.store)?;
    let capture = AudioCaptureEngine::new(
        Box::new(CpalCapture::new(&config.audio)),
        Arc::clone(&blobs),
    );
    let mut recorder = RecordingSessionController::new(capture, Rc::clone(&store));
    let mut preview = build_player(&config, &blobs);
    let title = title
        .unwrap_or_else(|| format!("Recording {}", Local::now().format("%Y-%m-%d %H:%M")));

    let finish_requested = finish_signal()?;
    let mut screen = DeckScreen::new(&config.playback.visual)?;
    let mut keys = KeyReader::spawn();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    if let Err(e) = recorder.begin_recording().await {
        drop(screen);
        return Err(report(e));
    }

    let outcome = loop {
        if finish_requested.swap(false, Ordering::Relaxed)
            && matches!(recorder.state(), RecorderState::Recording | RecorderState::Paused)
        {
            tracing::info!("Received SIGUSR1: finishing recording");
            if let Err(e) = recorder.finish().await {
                break Outcome::Failed(e);
            }
        }

        if recorder.state() == RecorderState::Idle {
            break Outcome::Closed;
        }
        screen.draw(&view(&recorder, &preview, &title))?;

        let input = tokio::select! {
            Some(event) = recorder.next_engine_event() => Input::Capture(event),
            Some(event) = preview.next_engine_event() => Input::Preview(event),
            Some(key) = keys.next() => Input::Key(key),
            _ = redraw.tick() => Input::Redraw,
        };

        match input {
            Input::Capture(event) => {
                if let Err(e) = recorder.apply_event(event) {
                    break Outcome::Failed(e);
                }
            }
            Input::Preview(event) => {
                if let Err(e) = preview.apply_event(event) {
                    screen.set_status(e.user_message());
                }
            }
            Input::Key(key) => match recorder.state() {
                RecorderState::Recording | RecorderState::Paused => match capture_key(&key) {
                    Some(CaptureKey::TogglePause) => {
                        if recorder.state() == RecorderState::Paused {
                            recorder.resume();
                        } else {
                            recorder.pause();
                        }
                    }
                    Some(CaptureKey::Finish) => {
                        if let Err(e) = recorder.finish().await {
                            break Outcome::Failed(e);
                        }
                    }
                    Some(CaptureKey::Cancel) => {
                        recorder.discard();
                        break Outcome::Closed;
                    }
                    None => {}
                },
                RecorderState::Reviewing => match review_key(&key) {
                    Some(ReviewKey::Save) => {
                        preview.unload();
                        screen.set_status("Saving…");
                        screen.draw(&view(&recorder, &preview, &title))?;
                        match recorder.save(&title).await {
                            Ok(saved) => break Outcome::Saved(saved),
                            Err(e) => screen.set_status(e.user_message()),
                        }
                    }
                    Some(ReviewKey::Preview) => {
                        toggle_preview(&recorder, &mut preview, &mut screen).await
                    }
                    Some(ReviewKey::RecordAgain) => {
                        preview.unload();
                        screen.clear_status();
                        if let Err(e) = recorder.begin_recording().await {
                            break Outcome::Failed(e);
                        }
                    }
                    Some(ReviewKey::Discard) => {
                        preview.unload();
                        recorder.discard();
                        break Outcome::Closed;
                    }
                    None => {}
                },
                _ => {}
            },
            Input::Redraw => {}
        }
    };

    drop(keys);
    screen.close()?;

    match outcome {
        Outcome::Saved(saved) => print_saved(&saved),
        Outcome::Closed => tracing::info!("Recorder closed without saving"),
        Outcome::Failed(e) => return Err(report(e)),
    }
    tracing::info!("=== recdeck recorder exited ===");
    Ok(())
}

async fn toggle_preview(
    recorder: &RecordingSessionController,
    preview: &mut PlaybackSessionController,
    screen: &mut DeckScreen,
) {
    let Some(take) = recorder.take() else {
        return;
    };
    if let Err(e) = preview.play_pause(PlaybackTarget::for_take(take)).await {
        screen.set_status(e.user_message());
    }
}

fn view<'a>(
    recorder: &RecordingSessionController,
    preview: &PlaybackSessionController,
    title: &'a str,
) -> View<'a> {
    match recorder.take() {
        Some(take) => View::Review {
            title,
            size_bytes: take.size_bytes(),
            preview: preview.target().map(|_| Progress::of(preview)),
        },
        None => View::Recording {
            state: recorder.state(),
            elapsed_ms: recorder.capture_session().elapsed_ms,
        },
    }
}

fn print_saved(saved: &SavedRecording) {
    println!("Saved recording #{}: {} ({})", saved.id, saved.title, saved.source);
}

fn report(error: SessionError) -> anyhow::Error {
    tracing::error!("Recording failed: {}", error);
    anyhow::anyhow!(error.user_message())
}
