//! Full-screen terminal view of the recorder and the player.
//!
//! Rendering is a pure function of a [`View`]; [`DeckScreen`] owns the
//! terminal (raw mode + alternate screen) and restores it on drop.

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use std::io::{self, Stdout};

use crate::capability::VisualConfig;
use crate::session::{PlaybackSessionController, PlaybackState, RecorderState};

/// Playhead snapshot for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

impl Progress {
    pub fn of(playback: &PlaybackSessionController) -> Self {
        Self {
            state: playback.state(),
            position_ms: playback.position_ms(),
            duration_ms: playback.duration_ms(),
        }
    }

    /// Fraction of the recording played, in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        match self.duration_ms {
            Some(duration) if duration > 0 => (self.position_ms as f64 / duration as f64).min(1.0),
            _ => 0.0,
        }
    }

    fn label(&self) -> String {
        let total = self
            .duration_ms
            .map_or_else(|| "--:--".to_string(), format_clock);
        format!("{} / {}", format_clock(self.position_ms), total)
    }
}

/// What the screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View<'a> {
    Recording {
        state: RecorderState,
        elapsed_ms: u64,
    },
    Review {
        title: &'a str,
        size_bytes: u64,
        preview: Option<Progress>,
    },
    Playback {
        title: &'a str,
        progress: Progress,
    },
}

impl View<'_> {
    fn heading(&self) -> String {
        match self {
            View::Recording { state, .. } => match state {
                RecorderState::Paused => "● PAUSED".to_string(),
                RecorderState::Finalizing => "● FINISHING".to_string(),
                _ => "● RECORDING".to_string(),
            },
            View::Review { title, .. } => format!("Review: {title}"),
            View::Playback { title, progress } => {
                format!("{} {}", state_marker(progress.state), title)
            }
        }
    }

    fn hints(&self) -> &'static str {
        match self {
            View::Recording { .. } => "Space pause/resume · Enter finish · q cancel",
            View::Review { .. } => "s save · p preview · r record again · q discard",
            View::Playback { .. } => "Space play/pause · ←/→ skip · s stop · d delete · q quit",
        }
    }
}

fn state_marker(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "▶",
        PlaybackState::PausedPlayback => "❚❚",
        PlaybackState::Loading => "…",
        PlaybackState::Ready | PlaybackState::Stopped => "■",
    }
}

/// `mm:ss`, growing to `h:mm:ss` past an hour.
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    let (hours, minutes, seconds) = (total_secs / 3600, total_secs / 60 % 60, total_secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Parses `#rrggbb`.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Colours taken from the waveform settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub wave: Color,
    pub progress: Color,
    /// Rows given to the progress bar
    pub height: u16,
}

impl Palette {
    pub fn from_visual(visual: &VisualConfig) -> Self {
        let wave = parse_hex_color(&visual.wave_color).unwrap_or_else(|| {
            tracing::warn!("Invalid wave_color '{}', using default", visual.wave_color);
            Color::Rgb(79, 74, 133)
        });
        let progress = parse_hex_color(&visual.progress_color).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid progress_color '{}', using default",
                visual.progress_color
            );
            Color::Rgb(56, 51, 81)
        });
        // One terminal row is roughly 16 pixels.
        let height = (visual.height / 16).clamp(1, 12) as u16;
        Self {
            wave,
            progress,
            height,
        }
    }
}

/// Draws `view` into `frame`.
pub fn render(frame: &mut Frame, view: &View, palette: &Palette, status: Option<&str>) {
    let area = frame.area();
    let [heading, body, message, footer] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(palette.height + 2),
        Constraint::Length(2),
        Constraint::Length(1),
    ])
    .areas(area);

    frame.render_widget(
        Paragraph::new(view.heading()).style(Style::default().add_modifier(Modifier::BOLD)),
        heading,
    );

    let bar = Rect {
        height: body.height.min(palette.height + 2),
        ..body
    };
    match view {
        View::Recording { elapsed_ms, .. } => {
            let clock = Paragraph::new(format_clock(*elapsed_ms))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL))
                .style(Style::default().fg(palette.wave));
            frame.render_widget(clock, bar);
        }
        View::Review {
            size_bytes,
            preview,
            ..
        } => {
            let text = match preview {
                Some(progress) => format!(
                    "{} bytes · preview {} {}",
                    size_bytes,
                    state_marker(progress.state),
                    progress.label()
                ),
                None => format!("{size_bytes} bytes"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::default().borders(Borders::ALL)),
                bar,
            );
        }
        View::Playback { progress, .. } => {
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL))
                .gauge_style(Style::default().fg(palette.progress).bg(palette.wave))
                .ratio(progress.ratio())
                .label(progress.label());
            frame.render_widget(gauge, bar);
        }
    }

    if let Some(status) = status {
        frame.render_widget(
            Paragraph::new(status)
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true }),
            message,
        );
    }

    frame.render_widget(
        Paragraph::new(view.hints()).style(Style::default().fg(Color::DarkGray)),
        footer,
    );
}

/// Owns the terminal while a deck screen is up.
pub struct DeckScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    palette: Palette,
    status: Option<String>,
    closed: bool,
}

impl DeckScreen {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new(visual: &VisualConfig) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            palette: Palette::from_visual(visual),
            status: None,
            closed: false,
        })
    }

    /// Message shown under the main view until replaced or cleared.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn draw(&mut self, view: &View) -> anyhow::Result<()> {
        let palette = self.palette;
        let status = self.status.as_deref();
        self.terminal
            .draw(|frame| render(frame, view, &palette, status))?;
        Ok(())
    }

    /// Restores the terminal. Idempotent.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for DeckScreen {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
