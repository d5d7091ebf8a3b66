//! Time-expiring cache for the authenticated session.
//!
//! The cache holds at most one [`SessionHandle`]. A handle younger than the
//! freshness window is handed out as-is; an older one is replaced wholesale by
//! a new authentication exchange. Authentication failures are returned to the
//! caller immediately and leave the cache empty or holding the old handle.
//!
//! Concurrent callers that all observe an expired handle each authenticate.
//! The last one to finish wins the cache slot. Refreshes are infrequent and
//! idempotent so the redundant exchanges are accepted rather than suppressed.

use std::ops::Deref;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::AuthError;

/// Produces a fresh authenticated session.
///
/// Implementations perform the full authentication exchange on every call.
/// Caching is the job of [`SessionCache`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The authenticated client object handed to operations.
    type Session: Send + Sync + 'static;

    /// Perform an authentication exchange.
    async fn authenticate(&self) -> Result<Self::Session, AuthError>;
}

/// A shared reference to an authenticated session and the instant it was created.
///
/// Clones share the same underlying session. Dereferences to the session.
pub struct SessionHandle<S> {
    session: Arc<S>,
    created_at: Instant,
}

impl<S> SessionHandle<S> {
    fn new(session: S) -> Self {
        Self {
            session: Arc::new(session),
            created_at: Instant::now(),
        }
    }

    /// Get the shared session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Get when this handle was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time elapsed since this handle was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Check whether this handle is still within `window`.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age() < window
    }

    /// Check whether two handles refer to the same session instance.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            created_at: self.created_at,
        }
    }
}

impl<S> Deref for SessionHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .field("age", &self.age())
            .finish()
    }
}

/// Default maximum age of a cached handle.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(50 * 60);

/// Lazily authenticating, time-expiring session cache.
pub struct SessionCache<A: Authenticator> {
    authenticator: A,
    freshness_window: Duration,
    current: RwLock<Option<SessionHandle<A::Session>>>,
}

impl<A: Authenticator> SessionCache<A> {
    /// Create an empty cache. Nothing is authenticated until the first
    /// [`SessionCache::get_handle`].
    pub fn new(authenticator: A, freshness_window: Duration) -> Self {
        Self {
            authenticator,
            freshness_window,
            current: RwLock::new(None),
        }
    }

    /// Get the configured freshness window.
    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Get the authenticator backing this cache.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Return a live handle, authenticating if the cache is empty or stale.
    ///
    /// # Errors
    ///
    /// Returns the authenticator's [`AuthError`] unchanged. Failures are not
    /// retried here.
    pub async fn get_handle(&self) -> Result<SessionHandle<A::Session>, AuthError> {
        if let Some(handle) = self.cached()? {
            return Ok(handle);
        }

        debug!(
            freshness_window_secs = self.freshness_window.as_secs(),
            "Session missing or expired; authenticating"
        );

        let session = self.authenticator.authenticate().await?;
        let handle = SessionHandle::new(session);

        let mut current = self
            .current
            .write()
            .map_err(|e| AuthError::CacheUnavailable {
                message: format!("Failed to acquire write lock: {}", e),
            })?;
        *current = Some(handle.clone());

        info!("Authenticated session established");
        Ok(handle)
    }

    /// Drop the cached handle so the next call re-authenticates.
    pub fn invalidate(&self) -> Result<(), AuthError> {
        let mut current = self
            .current
            .write()
            .map_err(|e| AuthError::CacheUnavailable {
                message: format!("Failed to acquire write lock: {}", e),
            })?;
        *current = None;
        Ok(())
    }

    fn cached(&self) -> Result<Option<SessionHandle<A::Session>>, AuthError> {
        let current = self
            .current
            .read()
            .map_err(|e| AuthError::CacheUnavailable {
                message: format!("Failed to acquire read lock: {}", e),
            })?;

        Ok(current
            .as_ref()
            .filter(|handle| handle.is_fresh(self.freshness_window))
            .cloned())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
