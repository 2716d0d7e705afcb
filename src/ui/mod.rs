//! Terminal presentation for the interactive commands.

pub mod screen;

pub use screen::{format_clock, DeckScreen, Palette, Progress, View};
