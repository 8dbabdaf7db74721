use std::sync::Arc;

use newsqa::cache::FileBackend;
use newsqa::client::FakeTransport;
use newsqa::session::{ClientConfig, SessionManager};
use serde_json::json;

fn manager(transport: &FakeTransport, path: &std::path::Path) -> SessionManager {
    SessionManager::new(
        ClientConfig::default(),
        Arc::new(transport.clone()),
        Arc::new(FileBackend::new(path)),
    )
}

#[tokio::test]
async fn transcript_survives_process_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let transport = FakeTransport::new();
    transport.push_json(200, json!({"sessionId": "disk-1"}));
    transport.push_json(200, json!({"answerText": "stored"}));

    {
        let manager = manager(&transport, &path);
        let mut session = manager.create_session().await.unwrap();
        manager.send(&mut session, "persist me").await.unwrap();
    }
    assert!(path.exists());

    let restarted = manager(&transport, &path);
    let session = restarted.resume().unwrap();
    assert_eq!(session.session_id(), "disk-1");
    let contents: Vec<_> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["persist me", "stored"]);
    assert_eq!(restarted.cached_session_count(), 1);
}
