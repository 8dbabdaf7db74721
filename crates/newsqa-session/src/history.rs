use std::collections::HashSet;

use newsqa_core::{Message, NewsqaError, Role};
use serde_json::{Map, Value};

/// Convert a server history payload into transcript messages.
///
/// Accepts a bare array or an object with a `messages` array. Field names
/// are looked up leniently: `role` then `sender`, `content` then `message`,
/// `ts` then `timestamp`. Entries without a usable `id` get one synthesized
/// from their role, position and timestamp; ids are unique within the result.
///
/// Roles must be `user`, `assistant` or `system` (or an alias such as
/// `human`, `ai`, `bot`, `model`). Any other role, e.g. `"tool"`, fails the
/// whole payload with [`NewsqaError::Format`] instead of dropping the entry.
pub fn normalize_history(payload: &Value) -> Result<Vec<Message>, NewsqaError> {
    normalize_history_at(payload, crate::now_millis())
}

/// [`normalize_history`] with an explicit "now" used for synthesized ids of
/// entries that carry no timestamp.
pub fn normalize_history_at(payload: &Value, now_millis: i64) -> Result<Vec<Message>, NewsqaError> {
    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("messages") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(NewsqaError::Format(
                    "unexpected history format from server".to_string(),
                ))
            }
        },
        _ => {
            return Err(NewsqaError::Format(
                "unexpected history format from server".to_string(),
            ))
        }
    };

    let mut seen_ids = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let Value::Object(fields) = entry else {
                return Err(NewsqaError::Format(format!(
                    "history entry {idx} is not an object"
                )));
            };
            let message = normalize_entry(idx, fields, now_millis, &seen_ids)?;
            seen_ids.insert(message.id.clone());
            Ok(message)
        })
        .collect()
}

fn normalize_entry(
    idx: usize,
    fields: &Map<String, Value>,
    now_millis: i64,
    seen_ids: &HashSet<String>,
) -> Result<Message, NewsqaError> {
    let role = match first_present(fields, &["role", "sender"]) {
        None => Role::User,
        Some(Value::String(name)) => name
            .parse::<Role>()
            .map_err(|e| NewsqaError::Format(format!("history entry {idx}: {e}")))?,
        Some(other) => {
            return Err(NewsqaError::Format(format!(
                "history entry {idx}: role must be a string, got {other}"
            )))
        }
    };

    let content = match first_present(fields, &["content", "message"]) {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };

    let ts = first_present(fields, &["ts", "timestamp"]).and_then(parse_timestamp);

    let id = match fields.get("id") {
        Some(Value::String(id)) if !id.is_empty() && !seen_ids.contains(id) => id.clone(),
        _ => synthesize_id(
            &format!("{role}-{idx}-{}", ts.unwrap_or(now_millis)),
            seen_ids,
        ),
    };

    Ok(Message {
        id,
        role,
        content,
        ts,
    })
}

/// `base`, or `base-<n>` for the smallest `n` not already taken.
fn synthesize_id(base: &str, seen_ids: &HashSet<String>) -> String {
    if !seen_ids.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !seen_ids.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// First field among `names` that is present and not null.
fn first_present<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| fields.get(*name).filter(|v| !v.is_null()))
}

/// Epoch milliseconds from a number, a numeric string, or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
        }
        _ => None,
    }
}
