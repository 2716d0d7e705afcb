//! Keyboard and signal input for the interactive commands.
//!
//! crossterm input is read on a plain thread and forwarded over a tokio
//! channel so the command loops can `select!` on keys alongside engine
//! events.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

/// Key presses from the terminal, until dropped.
pub struct KeyReader {
    keys: mpsc::UnboundedReceiver<KeyEvent>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyReader {
    pub fn spawn() -> Self {
        let (tx, keys) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match event::poll(Duration::from_millis(50)) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                            if tx.send(key).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!("Input handling error: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!("Input polling error: {}", e);
                        return;
                    }
                }
            }
        });

        Self {
            keys,
            stop,
            thread: Some(thread),
        }
    }

    /// Next key press. Cancel safe.
    pub async fn next(&mut self) -> Option<KeyEvent> {
        self.keys.recv().await
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Set when SIGUSR1 arrives; lets other programs finish a recording.
pub fn finish_signal() -> anyhow::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&flag))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;
    Ok(flag)
}

fn is_quit(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKey {
    TogglePause,
    Finish,
    Cancel,
}

pub fn capture_key(key: &KeyEvent) -> Option<CaptureKey> {
    if is_quit(key) {
        return Some(CaptureKey::Cancel);
    }
    match key.code {
        KeyCode::Char(' ') => Some(CaptureKey::TogglePause),
        KeyCode::Enter => Some(CaptureKey::Finish),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKey {
    Save,
    Preview,
    RecordAgain,
    Discard,
}

pub fn review_key(key: &KeyEvent) -> Option<ReviewKey> {
    if is_quit(key) {
        return Some(ReviewKey::Discard);
    }
    match key.code {
        KeyCode::Char('s') | KeyCode::Enter => Some(ReviewKey::Save),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(ReviewKey::Preview),
        KeyCode::Char('r') => Some(ReviewKey::RecordAgain),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKey {
    Toggle,
    Stop,
    /// Skip by this many multiples of the skip distance
    Skip(i64),
    Delete,
    Quit,
}

pub fn player_key(key: &KeyEvent) -> Option<PlayerKey> {
    if is_quit(key) {
        return Some(PlayerKey::Quit);
    }
    match key.code {
        KeyCode::Char(' ') => Some(PlayerKey::Toggle),
        KeyCode::Char('s') => Some(PlayerKey::Stop),
        KeyCode::Right | KeyCode::Char('l') => Some(PlayerKey::Skip(1)),
        KeyCode::Left | KeyCode::Char('h') => Some(PlayerKey::Skip(-1)),
        KeyCode::Char('d') | KeyCode::Delete => Some(PlayerKey::Delete),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn capture_keys() {
        assert_eq!(capture_key(&press(KeyCode::Char(' '))), Some(CaptureKey::TogglePause));
        assert_eq!(capture_key(&press(KeyCode::Enter)), Some(CaptureKey::Finish));
        assert_eq!(capture_key(&press(KeyCode::Esc)), Some(CaptureKey::Cancel));
        assert_eq!(
            capture_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(CaptureKey::Cancel)
        );
        assert_eq!(capture_key(&press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn review_keys() {
        assert_eq!(review_key(&press(KeyCode::Char('s'))), Some(ReviewKey::Save));
        assert_eq!(review_key(&press(KeyCode::Char('r'))), Some(ReviewKey::RecordAgain));
        assert_eq!(review_key(&press(KeyCode::Char('q'))), Some(ReviewKey::Discard));
    }

    #[test]
    fn player_keys() {
        assert_eq!(player_key(&press(KeyCode::Right)), Some(PlayerKey::Skip(1)));
        assert_eq!(player_key(&press(KeyCode::Left)), Some(PlayerKey::Skip(-1)));
        assert_eq!(player_key(&press(KeyCode::Char('s'))), Some(PlayerKey::Stop));
        assert_eq!(player_key(&press(KeyCode::Char('d'))), Some(PlayerKey::Delete));
        assert_eq!(player_key(&press(KeyCode::Char('x'))), None);
    }
}
