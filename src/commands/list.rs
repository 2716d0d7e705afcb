//! Print the saved recordings.

use chrono::Local;

use super::load_config;
use crate::model::SavedRecording;
use crate::session::RecordingLibrary;
use crate::store::create_store;

/// Lists saved recordings, newest first.
///
/// # Errors
/// - If the store cannot be opened or listed
pub async fn handle_list() -> anyhow::Result<()> {
    let config = load_config()?;
    let store = create_store(&config.store)?;
    let mut library = RecordingLibrary::new(store);

    library.refresh().await.map_err(|e| {
        tracing::error!("Failed to list recordings: {}", e);
        anyhow::anyhow!(e.user_message())
    })?;

    if library.recordings().is_empty() {
        println!("No recordings yet. Run 'recdeck record' to make one.");
        return Ok(());
    }

    for recording in library.recordings() {
        println!("{}", list_line(recording));
    }
    Ok(())
}

fn list_line(recording: &SavedRecording) -> String {
    format!(
        "{:>5}  {}  {}  ({})",
        format!("#{}", recording.id),
        recording
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        recording.title,
        recording.source
    )
}
