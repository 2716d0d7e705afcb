//! Concrete capabilities for running on a real machine.
//!
//! - [`CpalCapture`]: microphone capture through cpal, encoded as WAV
//! - [`WavDeck`]: headless waveform player with a tokio clock
//! - [`TerminalSurface`]: render surface sized by the terminal

pub mod cpal_capture;
pub mod terminal;
pub mod wav_deck;

pub use cpal_capture::{list_input_devices, CpalCapture, InputDeviceInfo};
pub use terminal::TerminalSurface;
pub use wav_deck::WavDeck;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Runs `f` with stderr pointed at /dev/null.
///
/// ALSA prints probing noise to stderr while devices are enumerated, which
/// tears up the terminal UI. If the redirect cannot be set up, `f` runs with
/// stderr untouched.
#[cfg(target_os = "linux")]
pub(crate) fn quiet_stderr<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    let dev_null = match OpenOptions::new().write(true).open("/dev/null") {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("Cannot open /dev/null, leaving stderr alone: {}", e);
            return f();
        }
    };

    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved == -1 {
        return f();
    }
    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(saved) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }
    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn quiet_stderr<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}
