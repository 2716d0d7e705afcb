//! In-memory object URLs for ephemeral audio buffers.
//!
//! A recorded take lives in memory until it is saved or thrown away. The
//! registry hands out `blob:` URLs for those buffers so the playback side can
//! address them like any other resource, and [`ObjectUrl`] revokes its URL
//! when dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// URL scheme prefix used for registry-backed resources.
pub const BLOB_SCHEME: &str = "blob:";

/// A registered binary buffer.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<Vec<u8>>,
    pub mime_type: String,
}

/// Registry of live object URLs.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<String, Blob>>,
    #[cfg(test)]
    revocations: Mutex<HashMap<String, u32>>,
}

impl BlobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a buffer and returns the guard that owns its URL.
    pub fn create_object_url(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("{BLOB_SCHEME}recdeck/{id}");
        let blob = Blob {
            bytes: Arc::new(bytes),
            mime_type: mime_type.into(),
        };

        tracing::debug!("Object URL created: {} ({} bytes)", url, blob.bytes.len());
        self.live.lock().unwrap().insert(url.clone(), blob.clone());

        ObjectUrl {
            url,
            blob,
            registry: Arc::clone(self),
        }
    }

    /// Returns the buffer behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.live.lock().unwrap().get(url).cloned()
    }

    /// Number of times `url` has been revoked.
    #[cfg(test)]
    pub fn revocation_count(&self, url: &str) -> u32 {
        self.revocations
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    fn revoke(&self, url: &str) {
        if self.live.lock().unwrap().remove(url).is_none() {
            tracing::warn!("Revoking unknown object URL: {}", url);
        }
        #[cfg(test)]
        {
            *self
                .revocations
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;
        }
        tracing::debug!("Object URL revoked: {}", url);
    }
}

/// Owning handle for a registered buffer. Dropping it revokes the URL.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    blob: Blob,
    registry: Arc<BlobRegistry>,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.blob.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.blob.mime_type
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_until_dropped() {
        let registry = BlobRegistry::new();
        let url = registry.create_object_url(vec![1, 2, 3], "audio/webm");
        let key = url.as_str().to_string();

        assert!(key.starts_with(BLOB_SCHEME));
        assert_eq!(registry.resolve(&key).unwrap().bytes.len(), 3);

        drop(url);

        assert!(registry.resolve(&key).is_none());
        assert_eq!(registry.revocation_count(&key), 1);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn urls_are_unique() {
        let registry = BlobRegistry::new();
        let a = registry.create_object_url(vec![0], "audio/wav");
        let b = registry.create_object_url(vec![0], "audio/wav");
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn dropped_urls_leave_nothing_behind() {
        let registry = BlobRegistry::new();
        for _ in 0..100 {
            drop(registry.create_object_url(vec![0; 16], "audio/wav"));
        }
        assert_eq!(registry.live_count(), 0);
    }
}
