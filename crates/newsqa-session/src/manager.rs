use std::sync::Arc;
use std::time::Duration;

use newsqa_cache::{CacheConfig, DurableBackend, TtlCache};
use newsqa_client::{ApiClient, ApiConfig, HttpTransport, SessionSummary};
use newsqa_core::NewsqaError;
use tokio_util::sync::CancellationToken;

use crate::{
    normalize_history, ChatSession, ReconcilerConfig, SessionStore, StreamReconciler,
    TurnObserver, TurnOutcome,
};

/// Settings for a [`SessionManager`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub reconciler: ReconcilerConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(base_url),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.api = self.api.with_header(name, value);
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache.prefix = prefix.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.reconciler = self.reconciler.with_turn_timeout(timeout);
        self
    }

    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.reconciler = self.reconciler.with_placeholder_text(text);
        self
    }
}

/// The user-level session flows: create, resume, load, refresh, reset,
/// clear and send.
pub struct SessionManager {
    client: Arc<ApiClient>,
    store: SessionStore,
    reconciler: StreamReconciler,
}

impl SessionManager {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        backend: Arc<dyn DurableBackend>,
    ) -> Self {
        let client = Arc::new(ApiClient::new(config.api, transport));
        let cache = Arc::new(TtlCache::new(backend, config.cache));
        Self::from_parts(client, SessionStore::new(cache), config.reconciler)
    }

    pub fn from_parts(
        client: Arc<ApiClient>,
        store: SessionStore,
        reconciler: ReconcilerConfig,
    ) -> Self {
        Self {
            reconciler: StreamReconciler::new(client.clone(), reconciler),
            client,
            store,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.reconciler = self.reconciler.with_observer(observer);
        self
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn reconciler(&self) -> &StreamReconciler {
        &self.reconciler
    }

    /// Start a session on the server and make it the current one.
    pub async fn create_session(&self) -> Result<ChatSession, NewsqaError> {
        let started = self.client.start_session().await?;
        if started.session_id.trim().is_empty() {
            return Err(NewsqaError::Format(
                "server returned an empty sessionId".to_string(),
            ));
        }
        self.store.set_last_session_id(&started.session_id);
        tracing::info!(session_id = %started.session_id, "session created");
        Ok(ChatSession::fresh(self.store.clone(), started.session_id))
    }

    /// Reopen the last used session from the cache, without touching the
    /// network.
    pub fn resume(&self) -> Option<ChatSession> {
        let session_id = self.store.last_session_id()?;
        tracing::debug!(session_id = %session_id, "resuming session");
        Some(ChatSession::open(self.store.clone(), session_id))
    }

    /// Make `session_id` current and replace its transcript with the server
    /// history.
    pub async fn load_session(&self, session_id: &str) -> Result<ChatSession, NewsqaError> {
        if session_id.trim().is_empty() {
            return Err(NewsqaError::Validation("missing sessionId".to_string()));
        }
        self.store.set_last_session_id(session_id);
        let mut session = ChatSession::open(self.store.clone(), session_id);
        self.refresh_history(&mut session).await?;
        Ok(session)
    }

    /// Replace the transcript with the server history. On failure the
    /// transcript is left as it was.
    pub async fn refresh_history(&self, session: &mut ChatSession) -> Result<(), NewsqaError> {
        let payload = self.client.session_history(session.session_id()).await?;
        let messages = normalize_history(&payload)?;
        tracing::debug!(
            session_id = %session.session_id(),
            count = messages.len(),
            "history refreshed"
        );
        session.replace_all(messages);
        Ok(())
    }

    /// Empty the local transcript. The server is not contacted.
    pub fn reset_local(&self, session: &mut ChatSession) {
        session.reset();
    }

    /// Clear the session on the server, then drop the local transcript.
    pub async fn clear_session(&self, session: &mut ChatSession) -> Result<(), NewsqaError> {
        self.client.clear_session(session.session_id()).await?;
        session.forget();
        tracing::info!(session_id = %session.session_id(), "session cleared");
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, NewsqaError> {
        self.client.list_sessions().await
    }

    /// Drop every cached entry under this manager's prefix.
    pub fn clear_local_cache(&self) {
        self.store.clear_all();
    }

    pub fn cached_session_count(&self) -> usize {
        self.store.cached_session_count()
    }

    pub async fn send(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<TurnOutcome, NewsqaError> {
        self.reconciler.send(session, text).await
    }

    pub async fn send_with_cancel(
        &self,
        session: &mut ChatSession,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, NewsqaError> {
        self.reconciler.send_with_cancel(session, text, cancel).await
    }
}
