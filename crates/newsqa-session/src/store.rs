use std::sync::Arc;

use newsqa_cache::TtlCache;
use newsqa_core::{session_key, Message, LAST_SESSION_KEY, SESSION_KEY_PREFIX};

/// Session-level view of a [`TtlCache`].
///
/// The cache owns the persisted copy of every transcript; cloning a store
/// shares the same cache.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<TtlCache>,
}

impl SessionStore {
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn last_session_id(&self) -> Option<String> {
        self.cache
            .get::<String>(LAST_SESSION_KEY)
            .filter(|id| !id.is_empty())
    }

    pub fn set_last_session_id(&self, session_id: &str) {
        self.cache.set(LAST_SESSION_KEY, session_id);
    }

    /// The cached transcript, or `None` when absent or expired.
    pub fn cached_messages(&self, session_id: &str) -> Option<Vec<Message>> {
        self.cache.get(&session_key(session_id))
    }

    /// The cached transcript, empty when absent or expired.
    pub fn load_messages(&self, session_id: &str) -> Vec<Message> {
        self.cached_messages(session_id).unwrap_or_default()
    }

    pub fn save_messages(&self, session_id: &str, messages: &[Message]) {
        self.cache.set(&session_key(session_id), messages);
    }

    pub fn remove_session(&self, session_id: &str) {
        self.cache.del(&session_key(session_id));
    }

    /// Logical keys currently held in memory.
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// Number of transcripts currently held in memory.
    pub fn cached_session_count(&self) -> usize {
        self.cached_keys()
            .iter()
            .filter(|k| k.starts_with(SESSION_KEY_PREFIX))
            .count()
    }

    pub fn clear_all(&self) {
        self.cache.clear_all();
    }
}
