use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Logical cache keys
// ---------------------------------------------------------------------------

/// Logical cache key holding the id of the last touched session.
pub const LAST_SESSION_KEY: &str = "lastSessionId";

/// Prefix of the logical cache key holding a session's message list.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Logical cache key for the message list of `session_id`.
pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = NewsqaError;

    /// Parses a role name, accepting the aliases servers commonly use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" | "bot" | "model" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(NewsqaError::Format(format!("unknown message role '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single entry of a session's transcript.
///
/// `id` is unique within one message list at any instant; it is not stable
/// across the lifetime of a chat turn. `content` is kept verbatim, including
/// literal newline markers the UI may split on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl Message {
    // -- Factory methods -----------------------------------------------------

    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            ts: None,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, content)
    }

    pub fn system(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::System, content)
    }

    // -- Builder methods -----------------------------------------------------

    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = Some(ts);
        self
    }

    // -- Accessor methods ----------------------------------------------------

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Content split on literal `\n` markers, one entry per rendered line.
    pub fn lines(&self) -> Vec<&str> {
        self.content.split("\\n").collect()
    }
}

// ---------------------------------------------------------------------------
// NewsqaError
// ---------------------------------------------------------------------------

/// Error type shared by every newsqa crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewsqaError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl NewsqaError {
    /// Text written into the transcript when a chat turn fails with this error.
    pub fn to_inline_message(&self) -> String {
        format!("Error: {self}")
    }
}

impl From<serde_json::Error> for NewsqaError {
    fn from(e: serde_json::Error) -> Self {
        NewsqaError::Format(e.to_string())
    }
}
