use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use newsqa_core::NewsqaError;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NewsqaError>> + Send>>;

/// Body of an [`ApiResponse`].
pub enum ResponseBody {
    /// Bytes delivered incrementally by the transport.
    Streaming(ByteStream),
    /// A body that was read in full before the response was handed over.
    Buffered(Bytes),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Streaming(_) => f.write_str("Streaming(..)"),
            ResponseBody::Buffered(b) => f.debug_tuple("Buffered").field(&b.len()).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn buffered(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: ResponseBody::Buffered(body.into()),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::buffered(status, Some("application/json"), value.to_string())
    }

    pub fn streaming(status: u16, content_type: Option<&str>, stream: ByteStream) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: ResponseBody::Streaming(stream),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type announces incremental text delivery.
    pub fn is_text_stream(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/event-stream") || ct.contains("text/plain")
        })
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, NewsqaError> {
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String, NewsqaError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and parse it as JSON.
    pub async fn into_json(self) -> Result<Value, NewsqaError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| NewsqaError::Format(format!("failed to parse response JSON: {e}")))
    }
}

/// Executes HTTP requests on behalf of [`ApiClient`](crate::ApiClient).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request`. Non-2xx statuses are returned as responses, not errors;
    /// only failures to reach the server are errors.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, NewsqaError>;
}

/// Production transport using reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, NewsqaError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NewsqaError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| NewsqaError::Transport(format!("stream error: {e}"))));

        Ok(ApiResponse {
            status,
            content_type,
            body: ResponseBody::Streaming(Box::pin(stream)),
        })
    }
}

/// Test transport with queued responses. Every executed request is recorded.
#[derive(Default, Clone)]
pub struct FakeTransport {
    responses: Arc<Mutex<VecDeque<Result<ApiResponse, NewsqaError>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: ApiResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_error(&self, error: NewsqaError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn push_json(&self, status: u16, value: Value) -> &Self {
        self.push_response(ApiResponse::json(status, &value))
    }

    pub fn push_text(&self, status: u16, content_type: &str, body: &str) -> &Self {
        self.push_response(ApiResponse::buffered(
            status,
            Some(content_type),
            body.to_string(),
        ))
    }

    /// Queue a 200 response whose body arrives as `chunks`, one item each.
    pub fn push_stream(&self, content_type: &str, chunks: Vec<Bytes>) -> &Self {
        self.push_stream_results(content_type, chunks.into_iter().map(Ok).collect())
    }

    /// Queue a 200 streaming response that may yield errors between chunks.
    pub fn push_stream_results(
        &self,
        content_type: &str,
        items: Vec<Result<Bytes, NewsqaError>>,
    ) -> &Self {
        let stream = futures::stream::iter(items);
        self.push_response(ApiResponse::streaming(
            200,
            Some(content_type),
            Box::pin(stream),
        ))
    }

    /// Requests executed so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, NewsqaError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(NewsqaError::Transport("FakeTransport exhausted".to_string())))
    }
}
