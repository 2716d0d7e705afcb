//! Delete a saved recording.

use super::{build_player, load_config};
use crate::blob::BlobRegistry;
use crate::session::RecordingLibrary;
use crate::store::create_store;

/// Deletes recording `id` from the store.
///
/// Deleting a recording that no longer exists succeeds.
///
/// # Errors
/// - If the store cannot be opened or rejects the delete
pub async fn handle_delete(id: i64) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = create_store(&config.store)?;
    let mut library = RecordingLibrary::new(store);
    let mut player = build_player(&config, &BlobRegistry::new());

    if let Err(e) = library.refresh().await {
        tracing::warn!("Could not refresh library before delete: {}", e);
    }
    let title = library.get(id).map(|r| r.title.clone());

    library
        .delete(id, &mut player)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    match title {
        Some(title) => println!("Deleted recording #{id}: {title}"),
        None => println!("Deleted recording #{id}"),
    }
    Ok(())
}
