//! HTTP client for the PolicyPal backend.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{ErrorResponse, HealthResponse, ReplyGenerator, ReplyRequest, ReplyResponse};
use crate::error::{ClientError, Result};
use crate::profile::{PolicyProfile, ProfileStore, ProfileUpdate};

/// HTTP client for the backend's chat and profile endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "http://localhost:5000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // Relative joins keep any path prefix only when the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ReplyGenerator for BackendClient {
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String> {
        tracing::debug!(
            message_length = request.message.len(),
            user_id = ?request.user_id,
            has_profile = request.profile.is_some(),
            "Requesting reply"
        );
        let response = self
            .http
            .post(self.url("api/chat")?)
            .json(request)
            .send()
            .await?;
        let reply: ReplyResponse = Self::handle_response(response).await?;
        Ok(reply.response)
    }

    async fn health(&self) -> Result<HealthResponse> {
        let response = self.http.get(self.url("api/health")?).send().await?;
        Self::handle_response(response).await
    }
}

#[async_trait]
impl ProfileStore for BackendClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<PolicyProfile>> {
        let mut url = self.url("api/profile/")?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Api {
                status: 0,
                message: format!("base URL cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .push(user_id);

        let response = self.http.get(url).send().await?;
        let profile: PolicyProfile = Self::handle_response(response).await?;
        Ok((!profile.is_empty()).then_some(profile))
    }

    async fn save_profile(&self, user_id: &str, profile: &PolicyProfile) -> Result<()> {
        let response = self
            .http
            .post(self.url("api/profile")?)
            .json(&ProfileUpdate { user_id, profile })
            .send()
            .await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_prefix() {
        let client = BackendClient::new("http://localhost:5000/backend").unwrap();
        assert_eq!(
            client.url("api/chat").unwrap().as_str(),
            "http://localhost:5000/backend/api/chat"
        );

        let client = BackendClient::new("http://localhost:5000").unwrap();
        assert_eq!(
            client.url("api/chat").unwrap().as_str(),
            "http://localhost:5000/api/chat"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            BackendClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
