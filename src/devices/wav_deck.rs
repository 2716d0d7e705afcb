//! Headless waveform player for WAV audio.
//!
//! `load` fetches the resource in a background task (object URL, HTTP or
//! filesystem) and decodes the header to learn the duration. While playing,
//! a clock task advances the playhead every tick and reports the position.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::blob::{BlobRegistry, BLOB_SCHEME};
use crate::capability::{
    RenderSurface, VisualConfig, WaveformBackend, WaveformEvent, WaveformHandle, WaveformSink,
};
use crate::error::DeviceFault;

pub struct WavDeck {
    blobs: Arc<BlobRegistry>,
    client: reqwest::Client,
    tick: Duration,
}

impl WavDeck {
    pub fn new(blobs: Arc<BlobRegistry>, tick: Duration) -> Self {
        Self {
            blobs,
            client: reqwest::Client::new(),
            tick,
        }
    }
}

impl WaveformBackend for WavDeck {
    fn create(
        &mut self,
        surface: &dyn RenderSurface,
        config: &VisualConfig,
        events: WaveformSink,
    ) -> Result<Box<dyn WaveformHandle>, DeviceFault> {
        let (width, height) = surface.layout_size();
        tracing::debug!(
            "Waveform {} on {}x{} surface (wave {}, progress {}, height {})",
            events.context(),
            width,
            height,
            config.wave_color,
            config.progress_color,
            config.height
        );

        Ok(Box::new(DeckHandle {
            blobs: Arc::clone(&self.blobs),
            client: self.client.clone(),
            tick: self.tick,
            events,
            transport: Arc::new(Mutex::new(Transport::default())),
            loader: None,
            clock: None,
            destroyed: false,
        }))
    }
}

/// Playhead state shared with the clock task.
#[derive(Debug, Default)]
struct Transport {
    duration_ms: Option<u64>,
    position_ms: u64,
    playing: bool,
}

impl Transport {
    /// Moves the playhead forward by `step_ms`.
    ///
    /// Returns the new position and whether the end was reached, or `None`
    /// when not playing. Reaching the end stops and rewinds.
    fn advance(&mut self, step_ms: u64) -> Option<(u64, bool)> {
        if !self.playing {
            return None;
        }
        let duration = self.duration_ms?;
        let position = self.position_ms.saturating_add(step_ms).min(duration);
        if position >= duration {
            self.playing = false;
            self.position_ms = 0;
            Some((duration, true))
        } else {
            self.position_ms = position;
            Some((position, false))
        }
    }
}

struct DeckHandle {
    blobs: Arc<BlobRegistry>,
    client: reqwest::Client,
    tick: Duration,
    events: WaveformSink,
    transport: Arc<Mutex<Transport>>,
    loader: Option<JoinHandle<()>>,
    clock: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl DeckHandle {
    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }

    fn start_clock(&mut self) {
        self.stop_clock();
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let tick = self.tick;
        self.clock = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            let mut last = Instant::now();
            loop {
                interval.tick().await;
                let now = Instant::now();
                let step_ms = now.duration_since(last).as_millis() as u64;
                last = now;

                let advanced = transport.lock().unwrap().advance(step_ms);
                let Some((position_ms, finished)) = advanced else {
                    return;
                };
                events.emit(WaveformEvent::TimeUpdate { position_ms });
                if finished {
                    events.emit(WaveformEvent::Finish);
                    return;
                }
            }
        }));
    }
}

impl WaveformHandle for DeckHandle {
    fn load(&mut self, url: &str) {
        if let Some(previous) = self.loader.take() {
            previous.abort();
        }
        *self.transport.lock().unwrap() = Transport::default();

        let url = url.to_string();
        let blobs = Arc::clone(&self.blobs);
        let client = self.client.clone();
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        self.loader = Some(tokio::spawn(async move {
            let bytes = match fetch(&blobs, &client, &url).await {
                Ok(bytes) => bytes,
                Err(fault) => {
                    tracing::warn!("Failed to fetch {}: {:?}", url, fault);
                    events.emit(WaveformEvent::Error(fault));
                    return;
                }
            };
            match wav_duration_ms(&bytes) {
                Ok(duration_ms) => {
                    transport.lock().unwrap().duration_ms = Some(duration_ms);
                    tracing::debug!("Decoded {}: {}ms", url, duration_ms);
                    events.emit(WaveformEvent::Ready { duration_ms });
                }
                Err(fault) => events.emit(WaveformEvent::Error(fault)),
            }
        }));
    }

    fn play_pause(&mut self) {
        let now_playing = {
            let mut transport = self.transport.lock().unwrap();
            if transport.duration_ms.is_none() {
                return;
            }
            transport.playing = !transport.playing;
            transport.playing
        };

        if now_playing {
            self.start_clock();
            self.events.emit(WaveformEvent::Play);
        } else {
            self.stop_clock();
            self.events.emit(WaveformEvent::Pause);
        }
    }

    fn stop(&mut self) {
        self.stop_clock();
        let was_playing = {
            let mut transport = self.transport.lock().unwrap();
            transport.position_ms = 0;
            std::mem::replace(&mut transport.playing, false)
        };
        if was_playing {
            self.events.emit(WaveformEvent::Pause);
        }
    }

    fn seek_to(&mut self, fraction: f64) {
        let position_ms = {
            let mut transport = self.transport.lock().unwrap();
            let Some(duration) = transport.duration_ms else {
                return;
            };
            transport.position_ms = (duration as f64 * fraction.clamp(0.0, 1.0)).round() as u64;
            transport.position_ms
        };
        self.events.emit(WaveformEvent::TimeUpdate { position_ms });
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.stop_clock();
        if let Some(loader) = self.loader.take() {
            if !loader.is_finished() {
                loader.abort();
                self.events.emit(WaveformEvent::Error(DeviceFault::Aborted));
            }
        }
    }
}

impl Drop for DeckHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Duration of a WAV buffer.
fn wav_duration_ms(bytes: &[u8]) -> Result<u64, DeviceFault> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DeviceFault::Decode(e.to_string()))?;
    let sample_rate = u64::from(reader.spec().sample_rate);
    if sample_rate == 0 {
        return Err(DeviceFault::Decode("sample rate is zero".to_string()));
    }
    Ok(u64::from(reader.duration()) * 1000 / sample_rate)
}

/// Reads the bytes behind an object URL, HTTP(S) URL or file path.
async fn fetch(
    blobs: &BlobRegistry,
    client: &reqwest::Client,
    url: &str,
) -> Result<Arc<Vec<u8>>, DeviceFault> {
    if url.starts_with(BLOB_SCHEME) {
        return blobs
            .resolve(url)
            .map(|blob| blob.bytes)
            .ok_or_else(|| DeviceFault::Fetch(format!("{url} has been revoked")));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        let response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DeviceFault::Fetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeviceFault::Fetch(e.to_string()))?;
        return Ok(Arc::new(bytes.to_vec()));
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    tokio::fs::read(path)
        .await
        .map(Arc::new)
        .map_err(|e| DeviceFault::Fetch(format!("{path}: {e}")))
}
