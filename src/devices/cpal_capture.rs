//! Microphone capture through cpal.
//!
//! Audio is captured at the device's native rate, down-mixed to mono 16-bit
//! PCM in memory and encoded as a WAV buffer when the capture finishes.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, DefaultStreamConfigError, SampleFormat};
use std::io::Cursor;
use std::mem;
use std::sync::{Arc, Mutex};

use super::quiet_stderr;
use crate::capability::{CaptureBackend, CaptureSink, CaptureStream, EncodedAudio};
use crate::config::AudioConfig;
use crate::error::DeviceFault;

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// An input device as shown by `recdeck devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    /// `(sample rate, channels)` of the default input configuration
    pub default_config: Option<(u32, u16)>,
}

/// Lists input devices in the order a numeric `device` setting refers to.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn list_input_devices() -> anyhow::Result<Vec<InputDeviceInfo>> {
    quiet_stderr(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = named_input_devices(&host)
            .map_err(|e| anyhow::anyhow!("Failed to enumerate audio devices: {e}"))?;

        Ok(devices
            .into_iter()
            .enumerate()
            .map(|(index, (name, device))| InputDeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                default_config: device
                    .default_input_config()
                    .ok()
                    .map(|config| (config.sample_rate().0, config.channels())),
                name,
            })
            .collect())
    })
}

/// Input devices whose name can be read, in host enumeration order.
fn named_input_devices(host: &cpal::Host) -> Result<Vec<(String, cpal::Device)>, cpal::DevicesError> {
    Ok(host
        .input_devices()?
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect())
}

/// Finds the configured device: "default", a numeric index or a name.
fn find_device(host: &cpal::Host, device_id: &str) -> Result<cpal::Device, DeviceFault> {
    if device_id == "default" {
        return host.default_input_device().ok_or(DeviceFault::Unavailable);
    }

    let devices = named_input_devices(host).map_err(|e| DeviceFault::Other(e.to_string()))?;
    let found = match device_id.parse::<usize>() {
        Ok(index) => devices.into_iter().nth(index),
        Err(_) => devices.into_iter().find(|(name, _)| name == device_id),
    };

    match found {
        Some((_, device)) => Ok(device),
        None => {
            tracing::error!(
                "Audio input device '{}' not found. Run 'recdeck devices' to see available devices.",
                device_id
            );
            Err(DeviceFault::Unavailable)
        }
    }
}

fn config_fault(err: DefaultStreamConfigError) -> DeviceFault {
    match err {
        DefaultStreamConfigError::DeviceNotAvailable => {
            DeviceFault::Denied("input device is not available".to_string())
        }
        DefaultStreamConfigError::StreamTypeNotSupported => DeviceFault::Unavailable,
        other => DeviceFault::Other(other.to_string()),
    }
}

fn build_fault(err: BuildStreamError) -> DeviceFault {
    match err {
        BuildStreamError::DeviceNotAvailable => {
            DeviceFault::Denied("input device is not available".to_string())
        }
        other => DeviceFault::Other(other.to_string()),
    }
}

/// cpal-backed [`CaptureBackend`].
pub struct CpalCapture {
    device: String,
    requested_sample_rate: u32,
    progress_interval_ms: u64,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device: config.device.clone(),
            requested_sample_rate: config.sample_rate,
            progress_interval_ms: config.progress_interval_ms.max(1),
        }
    }

    fn open(&self) -> Result<CpalStream, DeviceFault> {
        let host = cpal::default_host();
        let device = find_device(&host, &self.device)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());

        let supported = device.default_input_config().map_err(config_fault)?;
        let sample_rate = supported.sample_rate().0.max(1);
        let channels = usize::from(supported.channels().max(1));
        if sample_rate != self.requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.requested_sample_rate,
                sample_rate
            );
        }
        tracing::info!(
            "Recording device: {} ({}Hz, {} channels, {:?})",
            device_name,
            sample_rate,
            channels,
            supported.sample_format()
        );

        let shared = Arc::new(Mutex::new(Shared {
            sample_rate,
            channels,
            progress_interval_ms: self.progress_interval_ms,
            ..Shared::default()
        }));
        let config: cpal::StreamConfig = supported.config();

        let error_shared = Arc::clone(&shared);
        let on_error = move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            if let Some(sink) = error_shared.lock().unwrap().sink.as_ref() {
                sink.fault(DeviceFault::Other(err.to_string()));
            }
        };

        let data_shared = Arc::clone(&shared);
        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data.iter().copied().map(f32_to_i16).collect();
                    data_shared.lock().unwrap().push(&converted);
                },
                on_error,
                None,
            ),
            _ => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    data_shared.lock().unwrap().push(data);
                },
                on_error,
                None,
            ),
        }
        .map_err(build_fault)?;

        Ok(CpalStream {
            stream: Some(stream),
            shared,
        })
    }
}

#[async_trait(?Send)]
impl CaptureBackend for CpalCapture {
    async fn acquire(&mut self) -> Result<Box<dyn CaptureStream>, DeviceFault> {
        let stream = quiet_stderr(|| self.open())?;
        tracing::debug!("Input stream built");
        Ok(Box::new(stream))
    }
}

/// State shared with the audio callback.
#[derive(Debug, Default)]
struct Shared {
    samples: Vec<i16>,
    /// False before start and while paused
    recording: bool,
    sink: Option<CaptureSink>,
    sample_rate: u32,
    channels: usize,
    progress_interval_ms: u64,
    last_progress_ms: u64,
}

impl Shared {
    fn push(&mut self, data: &[i16]) {
        if !self.recording {
            return;
        }
        downmix(data, self.channels, &mut self.samples);

        let elapsed_ms = self.elapsed_ms();
        if elapsed_ms >= self.last_progress_ms + self.progress_interval_ms {
            self.last_progress_ms = elapsed_ms;
            if let Some(sink) = &self.sink {
                sink.progress(elapsed_ms);
            }
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate.max(1))
    }
}

struct CpalStream {
    stream: Option<cpal::Stream>,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait(?Send)]
impl CaptureStream for CpalStream {
    fn start(&mut self, sink: CaptureSink) -> Result<(), DeviceFault> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| DeviceFault::Other("input stream already released".to_string()))?;

        {
            let mut shared = self.shared.lock().unwrap();
            shared.samples.clear();
            shared.last_progress_ms = 0;
            shared.sink = Some(sink);
            shared.recording = true;
        }

        stream.play().map_err(|e| DeviceFault::Other(e.to_string()))?;
        tracing::debug!("Audio stream started");
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.lock().unwrap().recording = false;
        tracing::debug!("Recording paused");
    }

    fn resume(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.sink.is_some() {
            shared.recording = true;
            tracing::debug!("Recording resumed");
        }
    }

    async fn finish(&mut self) -> Result<EncodedAudio, DeviceFault> {
        self.release();

        let (samples, sample_rate) = {
            let mut shared = self.shared.lock().unwrap();
            shared.recording = false;
            shared.sink = None;
            (mem::take(&mut shared.samples), shared.sample_rate)
        };

        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
            return Ok(EncodedAudio {
                bytes: Vec::new(),
                mime_type: WAV_MIME_TYPE.to_string(),
            });
        }

        tracing::info!(
            "Recording stopped: {:.2}s ({} samples at {}Hz)",
            samples.len() as f32 / sample_rate as f32,
            samples.len(),
            sample_rate
        );
        let bytes = encode_wav(&samples, sample_rate)
            .map_err(|e| DeviceFault::Other(format!("WAV encoding failed: {e}")))?;
        Ok(EncodedAudio {
            bytes,
            mime_type: WAV_MIME_TYPE.to_string(),
        })
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Audio stream released");
        }
    }
}

/// Averages interleaved frames down to one channel.
fn downmix(data: &[i16], channels: usize, out: &mut Vec<i16>) {
    match channels {
        0 | 1 => out.extend_from_slice(data),
        _ => out.extend(data.chunks_exact(channels).map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        })),
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Encodes mono 16-bit samples as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer.into_inner())
}
