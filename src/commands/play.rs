//! Play a saved recording with transport controls.

use anyhow::anyhow;
use std::time::Duration;

use super::keys::{player_key, KeyReader, PlayerKey};
use super::{build_player, load_config};
use crate::blob::BlobRegistry;
use crate::engine::PlaybackEvent;
use crate::error::{PlaybackError, SessionError};
use crate::session::RecordingLibrary;
use crate::store::create_store;
use crate::ui::{DeckScreen, Progress, View};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

enum Input {
    Playback(PlaybackEvent),
    Key(crossterm::event::KeyEvent),
    Redraw,
}

/// Opens the player on recording `id` and starts playing it.
///
/// # Errors
/// - If the store cannot be listed or has no recording `id`
/// - If the terminal cannot be set up
pub async fn handle_play(id: i64) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = create_store(&config.store)?;
    let mut library = RecordingLibrary::new(store);
    library.refresh().await.map_err(|e| {
        tracing::error!("Failed to list recordings: {}", e);
        anyhow!(e.user_message())
    })?;

    let target = library.target_for(id).ok_or_else(|| {
        anyhow!("Recording #{id} not found. Run 'recdeck list' to see saved recordings.")
    })?;
    let title = library
        .get(id)
        .map(|r| r.title.clone())
        .unwrap_or_default();
    tracing::info!("Playing recording #{} from {}", id, target.resource.as_url());

    let blobs = BlobRegistry::new();
    let mut player = build_player(&config, &blobs);
    let skip_ms = config.playback.skip_ms as i64;

    let mut screen = DeckScreen::new(&config.playback.visual)?;
    let mut keys = KeyReader::spawn();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    if let Err(e) = player.play(target.clone()).await {
        show_error(&mut screen, &e);
    }

    let mut deleted = false;
    loop {
        screen.draw(&View::Playback {
            title: &title,
            progress: Progress::of(&player),
        })?;

        let input = tokio::select! {
            Some(event) = player.next_engine_event() => Input::Playback(event),
            Some(key) = keys.next() => Input::Key(key),
            _ = redraw.tick() => Input::Redraw,
        };

        match input {
            Input::Playback(event) => {
                if let Err(e) = player.apply_event(event) {
                    show_error(&mut screen, &e);
                }
            }
            Input::Key(key) => match player_key(&key) {
                Some(PlayerKey::Toggle) => {
                    screen.clear_status();
                    if let Err(e) = player.play_pause(target.clone()).await {
                        show_error(&mut screen, &e);
                    }
                }
                Some(PlayerKey::Stop) => player.stop(),
                Some(PlayerKey::Skip(steps)) => {
                    player.seek_relative(steps.saturating_mul(skip_ms));
                }
                Some(PlayerKey::Delete) => match library.delete(id, &mut player).await {
                    Ok(()) => {
                        deleted = true;
                        break;
                    }
                    Err(e) => screen.set_status(e.user_message()),
                },
                Some(PlayerKey::Quit) => break,
                None => {}
            },
            Input::Redraw => {}
        }
    }

    player.unload();
    drop(keys);
    screen.close()?;

    if deleted {
        println!("Deleted recording #{id}: {title}");
    }
    Ok(())
}

fn show_error(screen: &mut DeckScreen, error: &SessionError) {
    let message = match error {
        SessionError::Playback(e) if e.is_retryable() => {
            format!("{} Press Space to retry.", error.user_message())
        }
        SessionError::Playback(PlaybackError::TargetNotSized) => {
            "The terminal is too small to show the player.".to_string()
        }
        _ => error.user_message(),
    };
    screen.set_status(message);
}
