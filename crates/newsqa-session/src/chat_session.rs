use newsqa_core::Message;

use crate::SessionStore;

/// In-memory transcript of one session, kept convergent with the store.
///
/// Every mutation goes through [`ChatSession::mutate`], which persists the
/// whole list synchronously after the closure returns.
pub struct ChatSession {
    session_id: String,
    messages: Vec<Message>,
    store: SessionStore,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("session_id", &self.session_id)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Open `session_id` with whatever transcript the store still holds.
    pub fn open(store: SessionStore, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let messages = store.load_messages(&session_id);
        Self {
            session_id,
            messages,
            store,
        }
    }

    /// Start `session_id` with an empty, persisted transcript.
    pub fn fresh(store: SessionStore, session_id: impl Into<String>) -> Self {
        let mut session = Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            store,
        };
        session.reset();
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Apply `f` to the transcript, then persist it.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Vec<Message>) -> R) -> R {
        let result = f(&mut self.messages);
        self.store.save_messages(&self.session_id, &self.messages);
        result
    }

    /// Append `message` and return its index.
    pub fn push(&mut self, message: Message) -> usize {
        self.mutate(|messages| {
            messages.push(message);
            messages.len() - 1
        })
    }

    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.mutate(|current| *current = messages);
    }

    /// Empty the transcript and persist the empty list.
    pub fn reset(&mut self) {
        self.replace_all(Vec::new());
    }

    /// Empty the transcript and drop its cache entry.
    pub fn forget(&mut self) {
        self.messages.clear();
        self.store.remove_session(&self.session_id);
    }

    /// Adopt the stored transcript if the store still has one. Returns whether
    /// anything was adopted.
    pub fn sync_from_store(&mut self) -> bool {
        match self.store.cached_messages(&self.session_id) {
            Some(messages) => {
                self.messages = messages;
                true
            }
            None => false,
        }
    }
}
