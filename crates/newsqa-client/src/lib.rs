//! Client for the remote question-answering service.
//!
//! [`ApiClient`] speaks the service's session and chat endpoints over an
//! [`HttpTransport`]. [`ReqwestTransport`] is the production transport;
//! [`FakeTransport`] replays queued responses for tests.

mod api;
mod config;
pub mod transport;

pub use api::{ApiClient, SessionStart, SessionSummary};
pub use config::ApiConfig;
pub use transport::{
    ApiRequest, ApiResponse, ByteStream, FakeTransport, HttpTransport, Method, ReqwestTransport,
    ResponseBody,
};
