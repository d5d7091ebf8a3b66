//! # Sheetgate Core
//!
//! Admission and resilience layer for a rate-limited remote spreadsheet API.
//!
//! This crate provides:
//! - A single-worker FIFO [`OperationQueue`] spacing calls against the shared quota
//! - A bounded, fixed-delay [`RetryExecutor`]
//! - A lazily authenticating, time-expiring [`SessionCache`]
//! - Service-account authentication producing a bearer-token [`RemoteSession`]
//! - [`SheetClient`], composing all of the above
//!
//! # Examples
//!
//! ## Queued Operations
//!
//! ```rust,no_run
//! use sheetgate_core::{telemetry, GateConfig, GateError, SheetClient};
//!
//! # async fn example() -> Result<(), GateError> {
//! let config = GateConfig::load(None)?;
//! telemetry::init_tracing(&config.logging);
//!
//! let client = SheetClient::from_config(&config)?;
//!
//! // Runs after every previously submitted operation, retried on failure.
//! let sheet: serde_json::Value = client
//!     .submit("get-spreadsheet", |handle| async move {
//!         let request = handle.request(reqwest::Method::GET, "spreadsheets/abc123");
//!         Ok(handle.send_json(request).await?)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Standalone Retry
//!
//! ```rust
//! use sheetgate_core::retry::run_with_retry;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let result: Result<&str, String> =
//!     run_with_retry(|| async { Ok("done") }, 3, Duration::ZERO, "standalone").await;
//! assert_eq!(result, Ok("done"));
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod queue;
pub mod remote;
pub mod retry;
pub mod session;
pub mod telemetry;

pub use client::SheetClient;
pub use config::{
    GateConfig, LoggingConfig, QueueConfig, RemoteConfig, RetryConfig, SessionConfig,
};
pub use credentials::{AssertionClaims, ServiceAccountAuthenticator, ServiceAccountKey};
pub use error::{ApiError, AuthError, ConfigError, GateError, QueueError};
pub use queue::{OperationQueue, QueueRunState, QueuedResult};
pub use remote::RemoteSession;
pub use retry::{run_with_retry, RetryExecutor, RetryPolicy};
pub use session::{Authenticator, SessionCache, SessionHandle};
