//! Spreadsheet API client.
//!
//! [`SheetClient`] composes the session cache, the retry executor and the
//! operation queue into one value. Operations are closures that receive a
//! live [`SessionHandle`] and return a future:
//!
//! ```text
//! submit(label, op) ─► queue ─► retry loop ─► get_handle() ─► op(handle)
//! bypass(label, op) ─────────► retry loop ─► get_handle() ─► op(handle)
//! ```
//!
//! Every attempt fetches the handle anew, so an attempt that starts after the
//! freshness window has elapsed transparently re-authenticates.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::GateConfig;
use crate::credentials::ServiceAccountAuthenticator;
use crate::error::GateError;
use crate::queue::{OperationQueue, QueueRunState, QueuedResult};
use crate::retry::RetryExecutor;
use crate::session::{Authenticator, SessionCache, SessionHandle};

/// Queued, retrying, session-caching client.
///
/// Cloning is cheap; clones share the session cache and the queue.
///
/// # Examples
///
/// ```rust,no_run
/// use sheetgate_core::{GateConfig, GateError, SheetClient};
///
/// # async fn example() -> Result<(), GateError> {
/// let config = GateConfig::load(None)?;
/// let client = SheetClient::from_config(&config)?;
///
/// let values: serde_json::Value = client
///     .submit("read-range", |handle| async move {
///         let request = handle.request(reqwest::Method::GET, "spreadsheets/abc/values/A1:C3");
///         Ok(handle.send_json(request).await?)
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SheetClient<A: Authenticator = ServiceAccountAuthenticator> {
    sessions: Arc<SessionCache<A>>,
    retry: RetryExecutor,
    queue: OperationQueue,
}

impl<A: Authenticator> Clone for SheetClient<A> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            retry: self.retry.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl SheetClient<ServiceAccountAuthenticator> {
    /// Build a client authenticating with the service-account key at
    /// `config.credentials_path`.
    ///
    /// The key file is read and parsed here, once. No network traffic
    /// happens until the first operation.
    ///
    /// # Errors
    ///
    /// - `GateError::Config` if the configuration fails validation
    /// - `GateError::Auth` if the key file is unreadable or malformed
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        config.validate()?;

        let authenticator =
            ServiceAccountAuthenticator::from_file(&config.credentials_path, &config.remote)?;

        info!(
            client_email = authenticator.client_email(),
            "Loaded service account credentials"
        );

        Ok(Self::with_authenticator(authenticator, config))
    }
}

impl<A> SheetClient<A>
where
    A: Authenticator + 'static,
{
    /// Build a client around any [`Authenticator`].
    pub fn with_authenticator(authenticator: A, config: &GateConfig) -> Self {
        let sessions = SessionCache::new(authenticator, config.session.freshness_window());
        let retry = RetryExecutor::new(config.retry.policy()).silenced(config.silent);
        let queue = OperationQueue::new(config.queue.inter_item_delay());

        Self::from_parts(sessions, retry, queue)
    }

    /// Assemble a client from already configured components.
    pub fn from_parts(
        sessions: SessionCache<A>,
        retry: RetryExecutor,
        queue: OperationQueue,
    ) -> Self {
        debug!(
            freshness_window_secs = sessions.freshness_window().as_secs(),
            max_attempts = retry.policy().max_attempts,
            retry_delay_ms = retry.policy().delay.as_millis() as u64,
            inter_item_delay_ms = queue.inter_item_delay().as_millis() as u64,
            "Sheet client created"
        );

        Self {
            sessions: Arc::new(sessions),
            retry,
            queue,
        }
    }

    /// Get a live session handle, authenticating if needed.
    pub async fn get_handle(&self) -> Result<SessionHandle<A::Session>, GateError> {
        Ok(self.sessions.get_handle().await?)
    }

    /// Drop the cached session so the next operation re-authenticates.
    pub fn invalidate_session(&self) -> Result<(), GateError> {
        Ok(self.sessions.invalidate()?)
    }

    /// Run `operation` under the retry policy, without queueing.
    ///
    /// Each attempt obtains a handle from the session cache first; an
    /// authentication failure counts as a failed attempt.
    pub async fn run_with_retry<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, GateError>
    where
        F: Fn(SessionHandle<A::Session>) -> Fut,
        Fut: Future<Output = Result<T, GateError>>,
    {
        let sessions = &self.sessions;
        let operation = &operation;

        self.retry
            .run(label, move || async move {
                let handle = sessions.get_handle().await?;
                operation(handle).await
            })
            .await
    }

    /// Enqueue `operation` behind all previously submitted operations.
    ///
    /// Returns immediately. The returned future resolves once the operation
    /// has run to success or exhausted its retries.
    pub fn submit<T, F, Fut>(
        &self,
        label: impl Into<String>,
        operation: F,
    ) -> QueuedResult<T, GateError>
    where
        F: Fn(SessionHandle<A::Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, GateError>> + Send + 'static,
        T: Send + 'static,
    {
        let label = label.into();
        let client = self.clone();

        let queued = self.queue.submit(move || async move {
            client.run_with_retry(&label, operation).await
        });

        debug!(sequence = ?queued.sequence(), "Operation submitted");
        queued
    }

    /// Run `operation` immediately under the retry policy, skipping the queue.
    ///
    /// Bypassed operations are not spaced against queued ones and count
    /// against the same remote quota.
    pub async fn bypass<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, GateError>
    where
        F: Fn(SessionHandle<A::Session>) -> Fut,
        Fut: Future<Output = Result<T, GateError>>,
    {
        self.queue
            .bypass(|| self.run_with_retry(label, operation))
            .await
    }

    /// Get the current state of the operation queue.
    pub fn queue_state(&self) -> QueueRunState {
        self.queue.state()
    }

    /// Number of queued operations waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Get the session cache.
    pub fn sessions(&self) -> &SessionCache<A> {
        &self.sessions
    }

    /// Get the retry executor.
    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }
}

impl<A: Authenticator> std::fmt::Debug for SheetClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetClient")
            .field("freshness_window", &self.sessions.freshness_window())
            .field("retry", &self.retry)
            .field("queue_state", &self.queue.state())
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
