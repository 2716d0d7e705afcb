//! Configuration file editor command.
//!
//! Opens the recdeck configuration file in the user's preferred editor.

use std::process::Command;

use crate::config::{get_config_path, RecdeckConfig};

/// Opens the configuration file in the user's preferred editor, writing the
/// defaults first if it does not exist yet.
///
/// Tries `$EDITOR`, then nano, then vi. The edited file is checked afterwards
/// so mistakes are reported before the next recording.
///
/// # Errors
/// - If no editor can be found or executed
/// - If the editor exits with an error
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        RecdeckConfig::default().save_to(&config_path)?;
    }

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    if let Err(e) = RecdeckConfig::load_from(&config_path) {
        tracing::warn!("Edited config does not parse: {:#}", e);
        eprintln!("Warning: {e:#}");
        return Ok(());
    }

    tracing::info!("Config file edited successfully");
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in &["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

/// Checks if an editor is available in the system PATH.
fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
