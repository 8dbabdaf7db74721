use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use newsqa_client::{ApiClient, ApiResponse, ByteStream, ResponseBody};
use newsqa_core::{Message, NewsqaError};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{ChatSession, TurnEvent, TurnObserver, Utf8StreamDecoder};

/// Content of the assistant placeholder until the first reply byte arrives.
pub const DEFAULT_PLACEHOLDER: &str = "AI is thinking...";

/// Object fields holding the reply text of a JSON chat response, in order of
/// precedence.
pub const ANSWER_FIELDS: [&str; 3] = ["answer", "answerText", "text"];

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub placeholder_text: String,
    /// Upper bound on one turn, from dispatch to the last body read.
    pub turn_timeout: Option<Duration>,
}

impl ReconcilerConfig {
    pub fn new() -> Self {
        Self {
            placeholder_text: DEFAULT_PLACEHOLDER.to_string(),
            turn_timeout: None,
        }
    }

    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How a chat turn settled. Failures are already written into the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed { message: Message, chunks: usize },
    Failed { message: Message, error: NewsqaError },
}

impl TurnOutcome {
    /// The assistant message the turn settled on.
    pub fn message(&self) -> &Message {
        match self {
            TurnOutcome::Completed { message, .. } | TurnOutcome::Failed { message, .. } => message,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&NewsqaError> {
        match self {
            TurnOutcome::Failed { error, .. } => Some(error),
            TurnOutcome::Completed { .. } => None,
        }
    }
}

/// The assistant entry a turn writes into.
struct Slot {
    id: String,
    /// No reply text has been written yet; the entry still shows the placeholder.
    pristine: bool,
}

impl Slot {
    /// Index of the slot's entry, re-creating it at the end if it vanished.
    fn locate(&self, messages: &mut Vec<Message>) -> usize {
        if let Some(idx) = messages.iter().position(|m| m.id == self.id) {
            return idx;
        }
        messages.push(Message::assistant(self.id.clone(), String::new()));
        messages.len() - 1
    }
}

type TurnTable = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// A claim on a session's turn lock. The table entry is removed when the
/// last claim goes away, including when the owning future is dropped.
struct TurnSlot<'a> {
    turns: &'a TurnTable,
    session_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> TurnSlot<'a> {
    fn acquire(turns: &'a TurnTable, session_id: &str) -> Self {
        let lock = turns
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        Self {
            turns,
            session_id: session_id.to_string(),
            lock,
        }
    }
}

impl Drop for TurnSlot<'_> {
    fn drop(&mut self) {
        let mut turns = self.turns.lock();
        // the table's reference plus ours
        let last = turns
            .get(&self.session_id)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if last {
            turns.remove(&self.session_id);
        }
    }
}

/// Runs chat turns and reconciles the reply into a [`ChatSession`].
///
/// Turns for the same session id are serialized: a second `send` waits until
/// the first one settles, then continues from the stored transcript.
pub struct StreamReconciler {
    client: Arc<ApiClient>,
    config: ReconcilerConfig,
    observers: Vec<Arc<dyn TurnObserver>>,
    turns: TurnTable,
}

impl StreamReconciler {
    pub fn new(client: Arc<ApiClient>, config: ReconcilerConfig) -> Self {
        Self {
            client,
            config,
            observers: Vec::new(),
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one chat turn. Only validation failures are returned as errors;
    /// transport and format failures settle the turn with an inline error
    /// message.
    pub async fn send(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<TurnOutcome, NewsqaError> {
        self.send_with_cancel(session, text, CancellationToken::new())
            .await
    }

    /// [`send`](Self::send) that stops reading the reply once `cancel` fires.
    pub async fn send_with_cancel(
        &self,
        session: &mut ChatSession,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, NewsqaError> {
        let text = text.trim();
        if session.session_id().trim().is_empty() {
            return Err(NewsqaError::Validation("missing sessionId".to_string()));
        }
        if text.is_empty() {
            return Err(NewsqaError::Validation("message is empty".to_string()));
        }

        let turn = TurnSlot::acquire(&self.turns, session.session_id());
        let _running = turn.lock.lock().await;
        session.sync_from_store();
        Ok(self.run_turn(session, text, &cancel).await)
    }

    /// Sessions with a turn running or waiting to run.
    pub fn active_turns(&self) -> usize {
        self.turns.lock().len()
    }

    async fn run_turn(
        &self,
        session: &mut ChatSession,
        text: &str,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let session_id = session.session_id().to_string();
        let deadline = self.config.turn_timeout.map(|t| Instant::now() + t);

        let user = Message::user(format!("user-{}", Uuid::new_v4()), text)
            .with_ts(crate::now_millis());
        session.push(user.clone());
        self.notify(TurnEvent::UserAppended {
            session_id: session_id.clone(),
            message: user,
        })
        .await;

        let mut slot = Slot {
            id: format!("assistant-placeholder-{}", Uuid::new_v4()),
            pristine: true,
        };
        session.push(Message::assistant(
            slot.id.clone(),
            self.config.placeholder_text.clone(),
        ));
        self.notify(TurnEvent::PlaceholderAppended {
            session_id: session_id.clone(),
            message_id: slot.id.clone(),
        })
        .await;

        tracing::debug!(session_id = %session_id, "dispatching chat turn");
        let response = match bounded(self.client.chat(&session_id, text), deadline, cancel).await {
            Ok(response) => response,
            Err(e) => return self.fail(session, &mut slot, e).await,
        };

        let streaming = response.is_text_stream();
        let ApiResponse {
            status,
            content_type,
            body,
        } = response;
        match body {
            ResponseBody::Streaming(stream) if streaming => {
                self.consume_stream(session, slot, stream, deadline, cancel)
                    .await
            }
            ResponseBody::Buffered(bytes) if streaming => {
                let stream: ByteStream =
                    Box::pin(futures::stream::once(async move { Ok::<_, NewsqaError>(bytes) }));
                self.consume_stream(session, slot, stream, deadline, cancel)
                    .await
            }
            body => {
                let response = ApiResponse {
                    status,
                    content_type,
                    body,
                };
                let payload = match bounded(response.into_json(), deadline, cancel).await {
                    Ok(payload) => payload,
                    Err(e) => return self.fail(session, &mut slot, e).await,
                };
                self.settle(session, &mut slot, Some(extract_answer_text(&payload)), 0)
                    .await
            }
        }
    }

    async fn consume_stream(
        &self,
        session: &mut ChatSession,
        mut slot: Slot,
        mut stream: ByteStream,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut decoder = Utf8StreamDecoder::new();
        let mut chunks = 0usize;
        let mut failure: Option<(Message, NewsqaError)> = None;

        let drained = loop {
            let next = match bounded(async { Ok(stream.next().await) }, deadline, cancel).await {
                Ok(next) => next,
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(self.fail_slot(session, &mut slot, e).await);
                    }
                    break false;
                }
            };
            match next {
                None => break true,
                Some(Ok(bytes)) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        self.apply_chunk(session, &mut slot, text).await;
                        chunks += 1;
                    }
                }
                Some(Err(e)) if failure.is_none() => {
                    failure = Some(self.fail_slot(session, &mut slot, e).await);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        session_id = %session.session_id(),
                        error = %e,
                        "stream error after turn failed"
                    );
                }
            }
        };

        if drained {
            let tail = decoder.finish();
            if !tail.is_empty() {
                self.apply_chunk(session, &mut slot, tail).await;
                chunks += 1;
            }
        }

        match failure {
            // late chunks may have been appended after the failure
            Some((_, error)) => TurnOutcome::Failed {
                message: current_message(session, &slot),
                error,
            },
            None => self.settle(session, &mut slot, None, chunks).await,
        }
    }

    /// Write one decoded chunk into the slot: the first chunk replaces the
    /// placeholder, later ones append.
    async fn apply_chunk(&self, session: &mut ChatSession, slot: &mut Slot, chunk: String) {
        let (message_id, content_len) = session.mutate(|messages| {
            let idx = slot.locate(messages);
            let message = &mut messages[idx];
            if slot.pristine {
                message.content.clear();
                slot.pristine = false;
            }
            message.content.push_str(&chunk);
            (message.id.clone(), message.content.len())
        });
        self.notify(TurnEvent::ChunkApplied {
            session_id: session.session_id().to_string(),
            message_id,
            chunk,
            content_len,
        })
        .await;
    }

    /// Replace the slot's entry with a fresh id, and with `content` if given.
    fn finalize(
        &self,
        session: &mut ChatSession,
        slot: &mut Slot,
        content: Option<String>,
    ) -> Message {
        let new_id = format!("assistant-{}", Uuid::new_v4());
        let pristine = slot.pristine;
        let message = session.mutate(|messages| {
            let idx = slot.locate(messages);
            let content = match content {
                Some(content) => content,
                None if pristine => String::new(),
                None => std::mem::take(&mut messages[idx].content),
            };
            let message = Message::assistant(new_id.clone(), content);
            messages[idx] = message.clone();
            message
        });
        slot.id = new_id;
        slot.pristine = false;
        message
    }

    async fn settle(
        &self,
        session: &mut ChatSession,
        slot: &mut Slot,
        content: Option<String>,
        chunks: usize,
    ) -> TurnOutcome {
        let message = self.finalize(session, slot, content);
        self.notify(TurnEvent::Settled {
            session_id: session.session_id().to_string(),
            message: message.clone(),
        })
        .await;
        TurnOutcome::Completed { message, chunks }
    }

    async fn fail_slot(
        &self,
        session: &mut ChatSession,
        slot: &mut Slot,
        error: NewsqaError,
    ) -> (Message, NewsqaError) {
        tracing::warn!(session_id = %session.session_id(), error = %error, "chat turn failed");
        let message = self.finalize(session, slot, Some(error.to_inline_message()));
        self.notify(TurnEvent::Failed {
            session_id: session.session_id().to_string(),
            message: message.clone(),
            error: error.to_string(),
        })
        .await;
        (message, error)
    }

    async fn fail(
        &self,
        session: &mut ChatSession,
        slot: &mut Slot,
        error: NewsqaError,
    ) -> TurnOutcome {
        let (message, error) = self.fail_slot(session, slot, error).await;
        TurnOutcome::Failed { message, error }
    }

    async fn notify(&self, event: TurnEvent) {
        for observer in &self.observers {
            if let Err(e) = observer.on_event(event.clone()).await {
                tracing::warn!(
                    session_id = %event.session_id(),
                    error = %e,
                    "turn observer failed"
                );
            }
        }
    }
}

fn current_message(session: &ChatSession, slot: &Slot) -> Message {
    session
        .messages()
        .iter()
        .find(|m| m.id == slot.id)
        .cloned()
        .unwrap_or_else(|| Message::assistant(slot.id.clone(), String::new()))
}

/// Await `fut`, giving up at `deadline` or when `cancel` fires.
async fn bounded<T, F>(
    fut: F,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<T, NewsqaError>
where
    F: Future<Output = Result<T, NewsqaError>>,
{
    let timed = async move {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| NewsqaError::Timeout("chat turn deadline exceeded".to_string()))
                .and_then(|result| result),
            None => fut.await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NewsqaError::Cancelled("chat turn cancelled".to_string())),
        result = timed => result,
    }
}

/// Reply text of a JSON chat response.
///
/// A string is used as-is, `null` is empty, an object yields its first
/// present [`ANSWER_FIELDS`] entry, and anything else is serialized.
pub fn extract_answer_text(payload: &Value) -> String {
    match payload {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(fields) => ANSWER_FIELDS
            .iter()
            .find_map(|name| fields.get(*name).filter(|v| !v.is_null()))
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| payload.to_string()),
        other => other.to_string(),
    }
}
