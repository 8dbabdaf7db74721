use std::sync::Arc;

use newsqa_core::NewsqaError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::ApiConfig;

/// Reply of `POST /session/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: String,
}

/// One entry of `GET /session/list`. Timestamps are kept as the server sent
/// them (ISO string or epoch number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub last_active_at: Option<Value>,
}

/// Typed access to the question-answering service.
pub struct ApiClient {
    config: ApiConfig,
    transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> ApiRequest {
        let mut request = ApiRequest::new(method, self.config.endpoint(path));
        for (key, value) in &self.config.headers {
            request = request.with_header(key, value);
        }
        request
    }

    pub async fn start_session(&self) -> Result<SessionStart, NewsqaError> {
        let response = self
            .transport
            .execute(self.request(Method::Post, "/session/start"))
            .await?;
        let body = ensure_success(response, "start session").await?.into_json().await?;
        serde_json::from_value(body)
            .map_err(|e| NewsqaError::Format(format!("unexpected session start reply: {e}")))
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, NewsqaError> {
        let response = self
            .transport
            .execute(self.request(Method::Get, "/session/list"))
            .await?;
        let body = ensure_success(response, "list sessions").await?.into_json().await?;
        if body.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(body)
            .map_err(|e| NewsqaError::Format(format!("unexpected session list: {e}")))
    }

    /// Raw history payload; see `normalize_history` in `newsqa-session`.
    pub async fn session_history(&self, session_id: &str) -> Result<Value, NewsqaError> {
        require_session_id(session_id)?;
        let request = self
            .request(Method::Get, "/session/history")
            .with_query("sessionId", session_id);
        let response = self.transport.execute(request).await?;
        ensure_success(response, "fetch history").await?.into_json().await
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<Value, NewsqaError> {
        require_session_id(session_id)?;
        let request = self
            .request(Method::Delete, "/session/clear")
            .with_query("sessionId", session_id);
        let response = self.transport.execute(request).await?;
        let text = ensure_success(response, "clear session").await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Send one chat message. The successful response is returned unread so
    /// the caller can consume a streaming body incrementally.
    pub async fn chat(&self, session_id: &str, message: &str) -> Result<ApiResponse, NewsqaError> {
        require_session_id(session_id)?;
        if message.is_empty() {
            return Err(NewsqaError::Validation("missing message".to_string()));
        }
        let request = self
            .request(Method::Post, "/chat")
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
            .with_json(json!({ "sessionId": session_id, "message": message }));
        let response = self.transport.execute(request).await?;
        ensure_success(response, "chat").await
    }
}

fn require_session_id(session_id: &str) -> Result<(), NewsqaError> {
    if session_id.trim().is_empty() {
        return Err(NewsqaError::Validation("missing sessionId".to_string()));
    }
    Ok(())
}

/// Turn a non-2xx response into a transport error carrying the body text.
async fn ensure_success(response: ApiResponse, action: &str) -> Result<ApiResponse, NewsqaError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let body = match response.text().await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!(status, error = %e, "failed to read error body");
            String::new()
        }
    };
    let message = if body.is_empty() {
        format!("{action} failed ({status})")
    } else {
        format!("{action} failed ({status}): {body}")
    };
    Err(NewsqaError::Transport(message))
}
