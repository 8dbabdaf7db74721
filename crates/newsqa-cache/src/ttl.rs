use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use newsqa_core::NewsqaError;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Clock, DurableBackend, SystemClock};

/// Configuration for [`TtlCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace prepended to every key in the durable tier. Defaults to `"newsqa:"`.
    pub prefix: String,
    /// Maximum entry age. Defaults to one hour.
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "newsqa:".to_string(),
            ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// The envelope stored in both tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    /// Write time in epoch milliseconds.
    #[serde(rename = "writtenAt")]
    pub written_at: i64,
}

impl CacheEntry {
    fn is_expired(&self, now: i64, ttl_millis: i64) -> bool {
        now.saturating_sub(self.written_at) > ttl_millis
    }
}

/// Key/value cache with TTL expiry over an in-process tier and a durable tier.
///
/// All operations are synchronous and infallible from the caller's point of
/// view. Durable-tier failures are logged and swallowed.
pub struct TtlCache {
    memory: Mutex<HashMap<String, CacheEntry>>,
    backend: Arc<dyn DurableBackend>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl TtlCache {
    pub fn new(backend: Arc<dyn DurableBackend>, config: CacheConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn DurableBackend>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            backend,
            clock,
            config,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn durable_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.prefix)
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.config.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Store `value` under `key` in both tiers.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache value is not serializable");
                return;
            }
        };
        let entry = CacheEntry {
            value,
            written_at: self.clock.now_millis(),
        };
        let raw = serde_json::to_string(&entry);
        self.memory.lock().insert(key.to_string(), entry);

        let result = raw
            .map_err(NewsqaError::from)
            .and_then(|raw| self.backend.try_write(&self.durable_key(key), &raw));
        if let Err(e) = result {
            tracing::warn!(key = %key, error = %e, "durable cache write failed");
        }
    }

    /// Fetch `key` and deserialize it as `T`.
    ///
    /// A value that exists but does not deserialize as `T` is reported as
    /// absent and left in place.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Fetch the raw JSON value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();

        let cached = self.memory.lock().get(key).cloned();
        if let Some(entry) = cached {
            if !entry.is_expired(now, ttl) {
                return Some(entry.value);
            }
            tracing::debug!(key = %key, "cache entry expired");
            self.del(key);
            return None;
        }

        let durable_key = self.durable_key(key);
        let raw = match self.backend.try_read(&durable_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "durable cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if !entry.is_expired(now, ttl) => {
                let value = entry.value.clone();
                self.memory.lock().insert(key.to_string(), entry);
                Some(value)
            }
            Ok(_) => {
                tracing::debug!(key = %key, "durable cache entry expired");
                self.remove_durable(key);
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "malformed durable cache entry");
                self.remove_durable(key);
                None
            }
        }
    }

    /// Remove `key` from both tiers. Missing keys are a no-op.
    pub fn del(&self, key: &str) {
        self.memory.lock().remove(key);
        self.remove_durable(key);
    }

    /// Remove every key in this cache's namespace from both tiers. Keys of
    /// other namespaces sharing the durable backend are left alone.
    pub fn clear_all(&self) {
        self.memory.lock().clear();

        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list durable cache keys");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(&self.config.prefix)) {
            if let Err(e) = self.backend.remove(key) {
                tracing::warn!(key = %key, error = %e, "durable cache delete failed");
            }
        }
    }

    /// Keys currently held by the in-process tier, sorted. Expired entries are
    /// evicted first; durable-only keys that were never read are not listed.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let ttl = self.ttl_millis();

        let (expired, mut live): (Vec<String>, Vec<String>) = {
            let memory = self.memory.lock();
            let (expired, live): (Vec<_>, Vec<_>) =
                memory.iter().partition(|(_, e)| e.is_expired(now, ttl));
            (
                expired.into_iter().map(|(k, _)| k.clone()).collect(),
                live.into_iter().map(|(k, _)| k.clone()).collect(),
            )
        };
        for key in &expired {
            self.del(key);
        }

        live.sort();
        live
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    fn remove_durable(&self, key: &str) {
        if let Err(e) = self.backend.remove(&self.durable_key(key)) {
            tracing::warn!(key = %key, error = %e, "durable cache delete failed");
        }
    }
}
