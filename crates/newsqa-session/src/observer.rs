use async_trait::async_trait;
use newsqa_core::{Message, NewsqaError};

/// A transcript mutation made during a chat turn. Emitted after the mutation
/// has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    UserAppended {
        session_id: String,
        message: Message,
    },
    PlaceholderAppended {
        session_id: String,
        message_id: String,
    },
    ChunkApplied {
        session_id: String,
        message_id: String,
        chunk: String,
        content_len: usize,
    },
    Settled {
        session_id: String,
        message: Message,
    },
    Failed {
        session_id: String,
        message: Message,
        error: String,
    },
}

impl TurnEvent {
    pub fn session_id(&self) -> &str {
        match self {
            TurnEvent::UserAppended { session_id, .. }
            | TurnEvent::PlaceholderAppended { session_id, .. }
            | TurnEvent::ChunkApplied { session_id, .. }
            | TurnEvent::Settled { session_id, .. }
            | TurnEvent::Failed { session_id, .. } => session_id,
        }
    }
}

/// Receives [`TurnEvent`]s, typically to re-render the transcript.
#[async_trait]
pub trait TurnObserver: Send + Sync {
    async fn on_event(&self, event: TurnEvent) -> Result<(), NewsqaError>;
}

/// Logs turn events through `tracing`.
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnObserver for TracingObserver {
    async fn on_event(&self, event: TurnEvent) -> Result<(), NewsqaError> {
        match event {
            TurnEvent::UserAppended {
                session_id,
                message,
            } => {
                tracing::info!(session_id = %session_id, message_id = %message.id, "user message appended");
            }
            TurnEvent::PlaceholderAppended {
                session_id,
                message_id,
            } => {
                tracing::debug!(session_id = %session_id, message_id = %message_id, "placeholder appended");
            }
            TurnEvent::ChunkApplied {
                session_id,
                chunk,
                content_len,
                ..
            } => {
                tracing::trace!(
                    session_id = %session_id,
                    chunk_len = chunk.len(),
                    content_len = content_len,
                    "chunk applied"
                );
            }
            TurnEvent::Settled {
                session_id,
                message,
            } => {
                tracing::info!(
                    session_id = %session_id,
                    message_id = %message.id,
                    content_len = message.content.len(),
                    "turn settled"
                );
            }
            TurnEvent::Failed {
                session_id, error, ..
            } => {
                tracing::warn!(session_id = %session_id, error = %error, "turn failed");
            }
        }
        Ok(())
    }
}
