//! Backend collaborators: reply generation and profile storage.
//!
//! The session manager only depends on the [`ReplyGenerator`] trait; the
//! production implementation is [`BackendClient`], which talks to the
//! PolicyPal backend over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use policypal::client::{BackendClient, ReplyGenerator, ReplyRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = BackendClient::new("http://localhost:5000")?;
//! let reply = backend
//!     .generate_reply(&ReplyRequest::new("Which schemes cover crop insurance?"))
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

mod http;

pub use http::BackendClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profile::RequestProfile;

/// Body of a reply-generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// The user's message.
    pub message: String,
    /// Signed-in user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Profile of the signed-in user, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<RequestProfile>,
}

impl ReplyRequest {
    /// Request carrying only the message text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            profile: None,
        }
    }
}

/// Successful reply body. Extra fields (such as `model`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyResponse {
    pub response: String,
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Backend health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Remote operation that turns a user message into an assistant reply.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate the assistant reply for `request`.
    ///
    /// Any transport failure, non-success status or malformed body is an
    /// error; callers decide how to surface it.
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String>;

    /// Report whether the collaborator is reachable.
    async fn health(&self) -> Result<HealthResponse> {
        Ok(HealthResponse {
            status: "unknown".to_string(),
            message: None,
            model: None,
        })
    }
}
