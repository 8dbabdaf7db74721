use std::collections::BTreeMap;
use std::sync::Arc;

use newsqa_core::NewsqaError;
use parking_lot::Mutex;

/// Durable tier of a [`TtlCache`](crate::TtlCache).
///
/// Keys are full keys (namespace prefix included) and values are the
/// serialized cache envelopes. Every operation reports failure through its
/// result; the cache decides which failures to ignore. Several caches may
/// share one backend as long as their prefixes are disjoint.
pub trait DurableBackend: Send + Sync {
    /// Read the raw value stored under `key`, if any.
    fn try_read(&self, key: &str) -> Result<Option<String>, NewsqaError>;
    /// Store `value` under `key`, replacing any previous value.
    fn try_write(&self, key: &str, value: &str) -> Result<(), NewsqaError>;
    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), NewsqaError>;
    /// Every key currently stored, across all namespaces.
    fn keys(&self) -> Result<Vec<String>, NewsqaError>;
}

/// Process-local durable tier. Clones share the same underlying map, which
/// lets tests drop a cache and build a new one over the same "disk".
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl DurableBackend for MemoryBackend {
    fn try_read(&self, key: &str) -> Result<Option<String>, NewsqaError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn try_write(&self, key: &str, value: &str) -> Result<(), NewsqaError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), NewsqaError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, NewsqaError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
