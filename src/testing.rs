//! Stub capabilities and store shared by the unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::capability::{
    CaptureBackend, CaptureSink, CaptureStream, ContextId, EncodedAudio, RenderSurface,
    VisualConfig, WaveformBackend, WaveformEvent, WaveformHandle, WaveformSink,
};
use crate::error::{DeviceFault, StoreError};
use crate::model::SavedRecording;
use crate::store::{RecordingStore, UploadRequest};

/// What the stub microphone has been asked to do.
#[derive(Debug, Default)]
pub struct CaptureProbe {
    pub acquired: u32,
    pub released: u32,
    pub deny: Option<DeviceFault>,
    pub finish_fault: Option<DeviceFault>,
    pub payload: Vec<u8>,
    pub sinks: Vec<CaptureSink>,
    pub paused: bool,
}

impl CaptureProbe {
    /// Hardware handles currently reserved.
    pub fn held(&self) -> u32 {
        self.acquired - self.released
    }

    pub fn last_sink(&self) -> CaptureSink {
        self.sinks.last().cloned().expect("no capture started")
    }
}

pub struct StubCapture {
    probe: Rc<RefCell<CaptureProbe>>,
}

impl StubCapture {
    /// Microphone that records `payload` on every take.
    pub fn with_payload(payload: Vec<u8>) -> (Self, Rc<RefCell<CaptureProbe>>) {
        let probe = Rc::new(RefCell::new(CaptureProbe {
            payload,
            ..CaptureProbe::default()
        }));
        (
            Self {
                probe: Rc::clone(&probe),
            },
            probe,
        )
    }
}

#[async_trait(?Send)]
impl CaptureBackend for StubCapture {
    async fn acquire(&mut self) -> Result<Box<dyn CaptureStream>, DeviceFault> {
        let mut probe = self.probe.borrow_mut();
        if let Some(fault) = probe.deny.clone() {
            return Err(fault);
        }
        probe.acquired += 1;
        Ok(Box::new(StubStream {
            probe: Rc::clone(&self.probe),
            released: false,
        }))
    }
}

struct StubStream {
    probe: Rc<RefCell<CaptureProbe>>,
    released: bool,
}

#[async_trait(?Send)]
impl CaptureStream for StubStream {
    fn start(&mut self, sink: CaptureSink) -> Result<(), DeviceFault> {
        self.probe.borrow_mut().sinks.push(sink);
        Ok(())
    }

    fn pause(&mut self) {
        self.probe.borrow_mut().paused = true;
    }

    fn resume(&mut self) {
        self.probe.borrow_mut().paused = false;
    }

    async fn finish(&mut self) -> Result<EncodedAudio, DeviceFault> {
        tokio::task::yield_now().await;
        let probe = self.probe.borrow();
        if let Some(fault) = probe.finish_fault.clone() {
            return Err(fault);
        }
        Ok(EncodedAudio {
            bytes: probe.payload.clone(),
            mime_type: "audio/webm".to_string(),
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.probe.borrow_mut().released += 1;
        }
    }
}

impl Drop for StubStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// What the stub waveform library has been asked to do.
#[derive(Debug, Default)]
pub struct WaveformProbe {
    pub created: Vec<ContextId>,
    pub destroyed: Vec<ContextId>,
    pub loaded: Vec<(ContextId, String)>,
    pub commands: Vec<(ContextId, &'static str)>,
    pub seeks: Vec<f64>,
    pub sinks: Vec<WaveformSink>,
}

impl WaveformProbe {
    pub fn live(&self) -> usize {
        self.created.len() - self.destroyed.len()
    }

    pub fn sink(&self, context: ContextId) -> WaveformSink {
        self.sinks
            .iter()
            .find(|sink| sink.context() == context)
            .cloned()
            .expect("unknown context")
    }

    pub fn emit(&self, context: ContextId, event: WaveformEvent) {
        self.sink(context).emit(event);
    }
}

pub struct StubWaveform {
    probe: Rc<RefCell<WaveformProbe>>,
}

impl StubWaveform {
    pub fn new() -> (Self, Rc<RefCell<WaveformProbe>>) {
        let probe = Rc::new(RefCell::new(WaveformProbe::default()));
        (
            Self {
                probe: Rc::clone(&probe),
            },
            probe,
        )
    }
}

impl WaveformBackend for StubWaveform {
    fn create(
        &mut self,
        _surface: &dyn RenderSurface,
        _config: &VisualConfig,
        events: WaveformSink,
    ) -> Result<Box<dyn WaveformHandle>, DeviceFault> {
        let context = events.context();
        let mut probe = self.probe.borrow_mut();
        probe.created.push(context);
        probe.sinks.push(events);
        Ok(Box::new(StubHandle {
            context,
            probe: Rc::clone(&self.probe),
            destroyed: false,
        }))
    }
}

struct StubHandle {
    context: ContextId,
    probe: Rc<RefCell<WaveformProbe>>,
    destroyed: bool,
}

impl WaveformHandle for StubHandle {
    fn load(&mut self, url: &str) {
        self.probe
            .borrow_mut()
            .loaded
            .push((self.context, url.to_string()));
    }

    fn play_pause(&mut self) {
        self.probe
            .borrow_mut()
            .commands
            .push((self.context, "play_pause"));
    }

    fn stop(&mut self) {
        self.probe.borrow_mut().commands.push((self.context, "stop"));
    }

    fn seek_to(&mut self, fraction: f64) {
        self.probe.borrow_mut().seeks.push(fraction);
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.probe.borrow_mut().destroyed.push(self.context);
        }
    }
}

/// Render surface that reports zero size for its first `unsized_reads` reads.
pub struct StubSurface {
    unsized_reads: Cell<u32>,
}

impl StubSurface {
    pub fn sized() -> Self {
        Self::sized_after(0)
    }

    pub fn sized_after(unsized_reads: u32) -> Self {
        Self {
            unsized_reads: Cell::new(unsized_reads),
        }
    }

    pub fn never_sized() -> Self {
        Self::sized_after(u32::MAX)
    }
}

impl RenderSurface for StubSurface {
    fn layout_size(&self) -> (u32, u32) {
        let remaining = self.unsized_reads.get();
        if remaining == 0 {
            (640, 96)
        } else {
            self.unsized_reads.set(remaining.saturating_sub(1));
            (0, 0)
        }
    }
}

/// In-memory backend collaborator.
#[derive(Default)]
pub struct StubStore {
    pub uploads: RefCell<Vec<UploadRequest>>,
    pub upload_failure: RefCell<Option<StoreError>>,
    pub recordings: RefCell<Vec<SavedRecording>>,
    pub deleted: RefCell<Vec<i64>>,
}

impl StubStore {
    pub fn with_recordings(recordings: Vec<SavedRecording>) -> Self {
        Self {
            recordings: RefCell::new(recordings),
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl RecordingStore for StubStore {
    async fn upload_recording(&self, request: UploadRequest) -> Result<SavedRecording, StoreError> {
        tokio::task::yield_now().await;
        if let Some(err) = self.upload_failure.borrow_mut().take() {
            return Err(err);
        }
        let saved = recording(
            self.recordings.borrow().len() as i64 + 1,
            &request.title,
            "recording-X.webm",
        );
        self.uploads.borrow_mut().push(request);
        self.recordings.borrow_mut().push(saved.clone());
        Ok(saved)
    }

    async fn list_recordings(&self) -> Result<Vec<SavedRecording>, StoreError> {
        Ok(self.recordings.borrow().clone())
    }

    async fn delete_recording(&self, id: i64) -> Result<(), StoreError> {
        let mut recordings = self.recordings.borrow_mut();
        let before = recordings.len();
        recordings.retain(|r| r.id != id);
        if recordings.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.deleted.borrow_mut().push(id);
        Ok(())
    }

    fn playback_url(&self, source: &str) -> String {
        format!("http://stub/uploads/{source}")
    }
}

pub fn recording(id: i64, title: &str, source: &str) -> SavedRecording {
    SavedRecording {
        id,
        title: title.to_string(),
        source: source.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}
