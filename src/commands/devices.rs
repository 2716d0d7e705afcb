//! List available audio input devices.

use crate::devices::{list_input_devices, InputDeviceInfo};

/// Lists all available audio input devices on the system.
///
/// # Errors
/// - If the audio host cannot be initialized
pub fn handle_devices() -> anyhow::Result<()> {
    let devices = list_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!("Available audio input devices:");
    println!();
    for device in &devices {
        print!("{}", describe(device));
    }
    println!("Set `device` under [audio] in recdeck.toml to an ID or name.");
    Ok(())
}

fn describe(device: &InputDeviceInfo) -> String {
    let default_indicator = if device.is_default { " [DEFAULT]" } else { "" };
    let config_info = match device.default_config {
        Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
        None => "configuration unavailable".to_string(),
    };
    format!(
        "  ID: {}\n    Name: {}{}\n    Config: {}\n\n",
        device.index, device.name, default_indicator, config_info
    )
}
