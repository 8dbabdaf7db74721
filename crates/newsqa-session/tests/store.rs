use std::sync::Arc;
use std::time::Duration;

use newsqa_cache::{CacheConfig, DurableBackend, ManualClock, MemoryBackend, TtlCache};
use newsqa_core::Message;
use newsqa_session::{ChatSession, SessionStore};

fn store_over(backend: &MemoryBackend, clock: Arc<ManualClock>) -> SessionStore {
    SessionStore::new(Arc::new(TtlCache::with_clock(
        Arc::new(backend.clone()),
        CacheConfig::new("newsqa:", Duration::from_secs(3600)),
        clock,
    )))
}

fn sample() -> Vec<Message> {
    vec![
        Message::user("u1", "what happened?").with_ts(1),
        Message::assistant("a1", "a lot"),
    ]
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[test]
fn last_session_id_round_trip() {
    let backend = MemoryBackend::new();
    let store = store_over(&backend, Arc::new(ManualClock::new(0)));

    assert_eq!(store.last_session_id(), None);
    store.set_last_session_id("abc");
    assert_eq!(store.last_session_id(), Some("abc".to_string()));
    assert!(backend.contains_key("newsqa:lastSessionId"));
}

#[test]
fn empty_last_session_id_reads_as_none() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    store.set_last_session_id("");
    assert_eq!(store.last_session_id(), None);
}

#[test]
fn transcripts_survive_a_restart() {
    let backend = MemoryBackend::new();
    let clock = Arc::new(ManualClock::new(0));
    store_over(&backend, clock.clone()).save_messages("s1", &sample());

    let restarted = store_over(&backend, clock);
    assert_eq!(restarted.cached_messages("s1"), Some(sample()));
}

#[test]
fn transcripts_expire_after_ttl() {
    let backend = MemoryBackend::new();
    let clock = Arc::new(ManualClock::new(0));
    let store = store_over(&backend, clock.clone());
    store.save_messages("s1", &sample());

    clock.advance(Duration::from_secs(3601));
    assert_eq!(store.cached_messages("s1"), None);
    assert!(store.load_messages("s1").is_empty());
    assert!(!backend.contains_key("newsqa:session:s1"));
}

#[test]
fn session_count_ignores_other_keys() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    store.set_last_session_id("s1");
    store.save_messages("s1", &sample());
    store.save_messages("s2", &[]);

    assert_eq!(store.cached_session_count(), 2);
    assert_eq!(
        store.cached_keys(),
        vec!["lastSessionId", "session:s1", "session:s2"]
    );

    store.clear_all();
    assert_eq!(store.cached_session_count(), 0);
    assert_eq!(store.last_session_id(), None);
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

#[test]
fn every_mutation_is_persisted() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    let mut session = ChatSession::open(store.clone(), "s1");
    assert!(session.is_empty());

    assert_eq!(session.push(Message::user("u1", "hello")), 0);
    assert_eq!(store.load_messages("s1").len(), 1);

    session.mutate(|messages| messages[0].content.push_str(" there"));
    assert_eq!(store.load_messages("s1")[0].content, "hello there");

    session.replace_all(sample());
    assert_eq!(store.load_messages("s1"), sample());
}

#[test]
fn open_restores_cached_transcript() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    store.save_messages("s1", &sample());

    let session = ChatSession::open(store, "s1");
    assert_eq!(session.session_id(), "s1");
    assert_eq!(session.messages(), sample().as_slice());
}

#[test]
fn fresh_persists_an_empty_list() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    store.save_messages("s1", &sample());

    let session = ChatSession::fresh(store.clone(), "s1");
    assert!(session.is_empty());
    assert_eq!(store.cached_messages("s1"), Some(Vec::new()));
}

#[test]
fn reset_keeps_the_entry_and_forget_drops_it() {
    let backend = MemoryBackend::new();
    let store = store_over(&backend, Arc::new(ManualClock::new(0)));
    let mut session = ChatSession::open(store.clone(), "s1");
    session.replace_all(sample());

    session.reset();
    assert!(session.is_empty());
    assert_eq!(store.cached_messages("s1"), Some(Vec::new()));

    session.replace_all(sample());
    session.forget();
    assert!(session.is_empty());
    assert_eq!(store.cached_messages("s1"), None);
    assert_eq!(backend.try_read("newsqa:session:s1").unwrap(), None);
}

#[test]
fn sync_from_store_adopts_newer_transcript() {
    let store = store_over(&MemoryBackend::new(), Arc::new(ManualClock::new(0)));
    let mut stale = ChatSession::open(store.clone(), "s1");
    let mut other = ChatSession::open(store.clone(), "s1");
    other.replace_all(sample());

    assert!(stale.sync_from_store());
    assert_eq!(stale.messages(), sample().as_slice());

    store.remove_session("s1");
    assert!(!stale.sync_from_store());
    assert_eq!(stale.len(), 2);
}
