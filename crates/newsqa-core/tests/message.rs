use newsqa_core::{session_key, Message, NewsqaError, Role};
use serde_json::json;

#[test]
fn role_serializes_lowercase() {
    let msg = Message::assistant("a-1", "hello");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["role"], "assistant");
    assert_eq!(value["id"], "a-1");
    assert!(value.get("ts").is_none());
}

#[test]
fn ts_roundtrips_when_present() {
    let msg = Message::user("u-1", "hi").with_ts(5);
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["ts"], 5);

    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn deserialize_without_ts() {
    let msg: Message =
        serde_json::from_value(json!({"id": "s", "role": "system", "content": "rules"})).unwrap();
    assert!(msg.is_system());
    assert_eq!(msg.ts, None);
}

#[test]
fn role_aliases_parse() {
    assert_eq!("human".parse::<Role>().unwrap(), Role::User);
    assert_eq!("AI".parse::<Role>().unwrap(), Role::Assistant);
    assert_eq!("bot".parse::<Role>().unwrap(), Role::Assistant);
    assert_eq!(" system ".parse::<Role>().unwrap(), Role::System);
}

#[test]
fn unknown_role_is_format_error() {
    let err = "narrator".parse::<Role>().unwrap_err();
    assert!(matches!(err, NewsqaError::Format(_)));
}

#[test]
fn content_keeps_literal_newline_markers() {
    let msg = Message::assistant("a", "first\\nsecond");
    assert_eq!(msg.content(), "first\\nsecond");
    assert_eq!(msg.lines(), vec!["first", "second"]);
}

#[test]
fn inline_error_message_has_prefix() {
    let err = NewsqaError::Transport("connection refused".to_string());
    let text = err.to_inline_message();
    assert!(text.starts_with("Error: "));
    assert!(text.contains("connection refused"));
}

#[test]
fn session_key_is_namespaced() {
    assert_eq!(session_key("abc"), "session:abc");
}
