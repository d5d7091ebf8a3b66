//! Authenticated HTTP session against the remote spreadsheet API.
//!
//! A [`RemoteSession`] is what a [`crate::SessionHandle`] hands to operations:
//! a configured HTTP client, the bearer access token, and the API base URL.
//! Request and response shapes belong to the caller.

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Authenticated client object for the remote service.
#[derive(Clone)]
pub struct RemoteSession {
    http_client: reqwest::Client,
    access_token: String,
    api_base_url: String,
    issued_at: DateTime<Utc>,
}

impl RemoteSession {
    /// Create a session from an already obtained access token.
    pub fn new(
        http_client: reqwest::Client,
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            issued_at: Utc::now(),
        }
    }

    /// Get the bearer token for use in API requests.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get the API base URL, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Get when the access token was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get the underlying HTTP client.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Build an authenticated request for `path` relative to the API base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.api_base_url, path.trim_start_matches('/'));
        self.http_client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Send a request and decode a JSON response body.
    ///
    /// # Errors
    ///
    /// - `ApiError::RateLimitExceeded` for HTTP 429
    /// - `ApiError::HttpError` for any other non-success status
    /// - `ApiError::Json` if the body does not decode as `T`
    /// - `ApiError::Http` for transport failures
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ApiError::RateLimitExceeded { message });
            }

            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("api_base_url", &self.api_base_url)
            .field("issued_at", &self.issued_at)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
