//! Chat sessions on top of the TTL cache.
//!
//! - [`SessionStore`] maps sessions onto cache keys (`lastSessionId`,
//!   `session:<id>`).
//! - [`ChatSession`] is the in-memory transcript; every mutation is written
//!   through to the store before control returns.
//! - [`StreamReconciler`] runs one chat turn and folds a streamed or JSON
//!   reply into the transcript.
//! - [`normalize_history`] converts server history payloads into
//!   [`Message`](newsqa_core::Message)s.
//! - [`SessionManager`] wires everything into the client-level flows.

mod chat_session;
mod decoder;
mod history;
mod manager;
mod observer;
mod reconciler;
mod store;

pub use chat_session::ChatSession;
pub use decoder::Utf8StreamDecoder;
pub use history::{normalize_history, normalize_history_at};
pub use manager::{ClientConfig, SessionManager};
pub use observer::{TracingObserver, TurnEvent, TurnObserver};
pub use reconciler::{
    extract_answer_text, ReconcilerConfig, StreamReconciler, TurnOutcome, ANSWER_FIELDS,
    DEFAULT_PLACEHOLDER,
};
pub use store::SessionStore;

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
