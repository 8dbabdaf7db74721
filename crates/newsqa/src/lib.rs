//! newsqa: chat client for a news question-answering service.
//!
//! This crate re-exports the newsqa sub-crates for single-import usage.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `session` |
//! | `session` | `SessionManager`, `StreamReconciler`, `ChatSession`, history normalization |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use newsqa::cache::FileBackend;
//! use newsqa::client::ReqwestTransport;
//! use newsqa::session::{ClientConfig, SessionManager};
//!
//! let manager = SessionManager::new(
//!     ClientConfig::new("http://localhost:4000/api"),
//!     Arc::new(ReqwestTransport::new()),
//!     Arc::new(FileBackend::new("newsqa-cache.json")),
//! );
//! let mut session = match manager.resume() {
//!     Some(session) => session,
//!     None => manager.create_session().await?,
//! };
//! let outcome = manager.send(&mut session, "What happened today?").await?;
//! println!("{}", outcome.message().content);
//! ```

/// Message, Role, NewsqaError and the cache key layout. Always available.
pub use newsqa_core as core;

/// Two-tier TTL cache with pluggable durable backends.
pub use newsqa_cache as cache;

/// HTTP transport seam and the typed service client.
pub use newsqa_client as client;

/// Session store, turn reconciler and the session manager.
#[cfg(feature = "session")]
pub use newsqa_session as session;
