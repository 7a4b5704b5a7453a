use bytes::Bytes;
use dashmap::DashMap;

use crate::context::NetworkContext;

/// Process-wide store of clips awaiting playback, keyed by request id.
///
/// Entries live from `store` until the clip's session finishes and the
/// router calls `remove`.
pub struct AudioCache {
    entries: DashMap<String, Bytes>,
    network: NetworkContext,
}

impl AudioCache {
    pub fn new(network: NetworkContext) -> Self {
        Self {
            entries: DashMap::new(),
            network,
        }
    }

    fn file_name(id: &str) -> String {
        format!("{}.wav", id)
    }

    /// Stores `bytes` under `id` and returns the URL speakers fetch it from.
    pub fn store(&self, id: &str, bytes: Bytes) -> String {
        log::debug!("[AudioCache] Stored {} ({} bytes)", id, bytes.len());
        self.entries.insert(Self::file_name(id), bytes);
        self.network.url_builder().audio_url(id)
    }

    /// Looks up a clip by the file name used in its URL (`{id}.wav`).
    pub fn get(&self, file: &str) -> Option<Bytes> {
        self.entries.get(file).map(|entry| entry.value().clone())
    }

    /// Drops the clip stored under `id`. Returns false if it was not present.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.entries.remove(&Self::file_name(id)).is_some();
        if removed {
            log::debug!("[AudioCache] Removed {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
