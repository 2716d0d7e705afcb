//! Render surface backed by the terminal window.

use crate::capability::RenderSurface;

/// The terminal the waveform is drawn in. Its size is read on every call so
/// resizes are picked up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSurface;

impl RenderSurface for TerminalSurface {
    fn layout_size(&self) -> (u32, u32) {
        match crossterm::terminal::size() {
            Ok((columns, rows)) => (u32::from(columns), u32::from(rows)),
            Err(e) => {
                tracing::debug!("Terminal size unavailable: {}", e);
                (0, 0)
            }
        }
    }
}
