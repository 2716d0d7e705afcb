//! Media-capture capability contract.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::DeviceFault;

/// Identity of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture#{}", self.0)
    }
}

/// Signal emitted by a running capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSignal {
    /// Total captured audio so far, excluding paused time
    Progress { elapsed_ms: u64 },
    /// Stream-level failure reported outside of a method call
    Fault(DeviceFault),
}

/// Sender handed to a capture stream, stamped with its session.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<(SessionId, CaptureSignal)>,
}

impl CaptureSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<(SessionId, CaptureSignal)>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn progress(&self, elapsed_ms: u64) {
        self.emit(CaptureSignal::Progress { elapsed_ms });
    }

    pub fn fault(&self, fault: DeviceFault) {
        self.emit(CaptureSignal::Fault(fault));
    }

    fn emit(&self, signal: CaptureSignal) {
        // The engine may already be gone; nobody is left to tell.
        let _ = self.tx.send((self.session, signal));
    }
}

/// Encoded result of a finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Access to the host's microphone.
#[async_trait(?Send)]
pub trait CaptureBackend {
    /// Asks for microphone access and reserves the hardware.
    ///
    /// The returned stream holds the hardware until [`CaptureStream::release`]
    /// is called or it is dropped.
    async fn acquire(&mut self) -> Result<Box<dyn CaptureStream>, DeviceFault>;
}

/// A reserved microphone stream.
#[async_trait(?Send)]
pub trait CaptureStream {
    /// Starts encoding into the stream's buffer and emitting progress.
    fn start(&mut self, sink: CaptureSink) -> Result<(), DeviceFault>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stops capture and returns the encoded buffer. May be empty.
    async fn finish(&mut self) -> Result<EncodedAudio, DeviceFault>;

    /// Releases the hardware. Must be safe to call more than once.
    fn release(&mut self);
}
