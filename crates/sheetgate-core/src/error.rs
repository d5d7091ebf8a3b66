//! Error types for sheetgate operations.
//!
//! The taxonomy mirrors the layers of the client: authentication failures,
//! remote API failures, queue delivery failures and configuration failures.
//! [`GateError`] is the umbrella type returned by [`crate::SheetClient`].
//!
//! None of these types carry retry classification. The retry executor treats
//! every failure the same way.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while establishing an authenticated session.
///
/// Raised by [`crate::Authenticator`] implementations and propagated unchanged
/// by [`crate::SessionCache`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// The credentials file could not be read.
    #[error("Failed to read credentials file {path}: {message}")]
    CredentialsUnreadable { path: PathBuf, message: String },

    /// The credentials file was read but its content is unusable.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// The private key in the credentials could not be parsed.
    #[error("Invalid private key: {message}")]
    InvalidPrivateKey { message: String },

    /// Signing the token assertion failed.
    #[error("JWT signing failed: {message}")]
    JwtSigningFailed { message: String },

    /// The token endpoint rejected the assertion.
    #[error("Token exchange failed: {status} - {message}")]
    TokenExchangeFailed { status: u16, message: String },

    /// Network connectivity or transport error during the handshake.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The session cache lock was poisoned.
    #[error("Session cache unavailable: {message}")]
    CacheUnavailable { message: String },
}

/// Failures of a call against the remote tabular-data service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// The service reported that the shared quota is exhausted (HTTP 429).
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// The response body could not be decoded.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failure (connect, TLS, timeout).
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures delivering the outcome of a queued item.
///
/// These never affect sibling items; only the handle of the failed item
/// observes them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The item's work panicked or was dropped before producing an outcome.
    #[error("Queued operation {sequence} was abandoned before completing")]
    ItemAbandoned { sequence: u64 },

    /// Submission happened outside a Tokio runtime so no worker could start.
    #[error("No Tokio runtime available to drain the operation queue")]
    NoRuntime,
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A configuration value is outside its allowed range.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Top-level error for client operations.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure raised by caller-supplied work.
    #[error("Operation failed: {message}")]
    Operation { message: String },
}

impl GateError {
    /// Convenience constructor for failures raised by caller-supplied work.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
