//! Two-tier key/value cache with TTL expiry.
//!
//! [`TtlCache`] keeps a fast in-process map in front of a [`DurableBackend`]
//! that survives process restarts. Every entry is stamped with its write time
//! and is treated as absent from both tiers once it is older than the
//! configured TTL.
//!
//! Storage failures never reach the caller: a failed durable write leaves the
//! in-process tier authoritative, and a failed or malformed durable read is a
//! cache miss.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use newsqa_cache::{CacheConfig, FileBackend, TtlCache};
//!
//! let backend = Arc::new(FileBackend::new("/tmp/newsqa/store.json"));
//! let cache = TtlCache::new(backend, CacheConfig::new("newsqa:", Duration::from_secs(3600)));
//! cache.set("lastSessionId", &"abc");
//! assert_eq!(cache.get::<String>("lastSessionId").as_deref(), Some("abc"));
//! ```

mod backend;
mod clock;
mod file;
mod ttl;

pub use backend::{DurableBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileBackend;
pub use ttl::{CacheConfig, CacheEntry, TtlCache};
