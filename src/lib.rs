//! recdeck: record microphone takes, review them, save them to a recording
//! store and play them back with a progress view.
//!
//! The engines in [`engine`] own the audio devices, the controllers in
//! [`session`] hold the user-facing state, and [`commands`] wires them to the
//! terminal.

pub mod app;
pub mod blob;
pub mod capability;
pub mod commands;
pub mod config;
pub mod devices;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;
pub mod store;
pub mod ui;

#[cfg(test)]
mod testing;
