//! Request Data Gateway: the workflow's only boundary to the lab API.
//!
//! `RequestGateway` is the seam: `HttpGateway` talks to the real server,
//! `MockGateway` simulates it in memory. Every response passes through
//! `envelope` before reaching callers, so a payload that does not match
//! the record schema fails here with `GatewayError::Decode`.

pub mod envelope;
pub mod http;
pub mod mock;

pub use envelope::*;
pub use http::*;
pub use mock::*;

use thiserror::Error;

use crate::models::{LabTestRequest, ResultEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Transport(String),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    /// The mutation was applied but the updated record could not be read back.
    #[error("Saved, but reloading the request failed: {0}")]
    ReloadFailed(String),
}

impl GatewayError {
    /// Message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "Your session has expired. Please sign in again.".into(),
            Self::NotFound(_) => "Test request not found".into(),
            Self::Transport(_) => "Service Unavailable".into(),
            Self::Server { message, .. } => message.clone(),
            Self::Decode(_) => "Unexpected response from the lab service".into(),
            Self::ReloadFailed(_) => {
                "Changes were saved, but the updated test request could not be loaded".into()
            }
        }
    }
}

/// The four logical operations the result workflow needs.
///
/// Implementations are blocking; callers that must keep a UI responsive
/// run them on a worker thread.
pub trait RequestGateway: Send + Sync {
    /// Fetch one lab test request by id.
    fn fetch_request(&self, id: &str) -> Result<LabTestRequest, GatewayError>;

    /// Record the four result fields.
    fn submit_result(&self, id: &str, entry: &ResultEntry) -> Result<LabTestRequest, GatewayError>;

    /// Ask the server to produce an AI suggestion for the recorded result.
    fn request_ai_suggestion(
        &self,
        id: &str,
        entry: &ResultEntry,
    ) -> Result<LabTestRequest, GatewayError>;

    /// Ask the server to generate the report and complete the request.
    fn finalize_request(&self, id: &str) -> Result<LabTestRequest, GatewayError>;
}
