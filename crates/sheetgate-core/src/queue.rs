//! # Operation Queue
//!
//! Serializes units of work so that concurrent callers never burst requests
//! against the shared remote quota.
//!
//! Submissions are appended to a FIFO sequence and drained by a single worker
//! task. The worker starts on the first submission while the queue is idle,
//! runs one item at a time, pauses for the inter-item delay, and exits when the
//! sequence is empty.
//!
//! # State Transitions
//! ```text
//! Idle → Draining: submit() while no worker is active
//! Draining → Idle: worker finds the sequence empty, or the worker is
//!                  dropped (pending items are then abandoned)
//! ```
//!
//! Each item runs in its own task awaited by the worker. A failing or
//! panicking item only affects its own [`QueuedResult`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use crate::error::QueueError;

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce() -> JobFuture + Send>;

/// Default pause between queued items.
pub const DEFAULT_INTER_ITEM_DELAY: Duration = Duration::from_millis(100);

/// Observable state of the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRunState {
    /// No worker is active
    Idle,
    /// A worker is executing or about to execute the head of the queue
    Draining,
}

/// A submitted unit of work waiting to be executed.
struct QueueItem {
    sequence: u64,
    enqueued_at: Instant,
    job: Job,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    draining: bool,
    next_sequence: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    inter_item_delay: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // The lock is never held across user code, so a poisoned guard still
        // holds a consistent sequence.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-worker FIFO queue for asynchronous units of work.
///
/// Cloning yields another handle to the same queue.
///
/// # Examples
///
/// ```rust
/// use sheetgate_core::queue::OperationQueue;
/// use sheetgate_core::QueueError;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = OperationQueue::new(Duration::from_millis(10));
///
/// let first = queue.submit(|| async { Ok::<_, QueueError>(1) });
/// let second = queue.submit(|| async { Ok::<_, QueueError>(2) });
///
/// assert_eq!(first.await, Ok(1));
/// assert_eq!(second.await, Ok(2));
/// # }
/// ```
#[derive(Clone)]
pub struct OperationQueue {
    shared: Arc<Shared>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_INTER_ITEM_DELAY)
    }
}

impl OperationQueue {
    /// Create an idle queue with the given pause between items.
    pub fn new(inter_item_delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    draining: false,
                    next_sequence: 0,
                }),
                inter_item_delay,
            }),
        }
    }

    /// Get the pause between items.
    pub fn inter_item_delay(&self) -> Duration {
        self.shared.inter_item_delay
    }

    /// Get the current state of the drain loop.
    pub fn state(&self) -> QueueRunState {
        if self.shared.lock().draining {
            QueueRunState::Draining
        } else {
            QueueRunState::Idle
        }
    }

    /// Number of items waiting to run, excluding the one in progress.
    pub fn pending(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Append `work` to the tail of the queue.
    ///
    /// Returns immediately. The returned [`QueuedResult`] resolves with the
    /// work's outcome once the worker has executed it, or with a
    /// [`QueueError`] if the work was abandoned.
    ///
    /// Must be called from within a Tokio runtime; otherwise the result
    /// resolves to `QueueError::NoRuntime` and nothing is enqueued.
    pub fn submit<T, E, F, Fut>(&self, work: F) -> QueuedResult<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<QueueError> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => return QueuedResult::failed(QueueError::NoRuntime),
        };

        let (sender, receiver) = oneshot::channel();
        let job: Job = Box::new(move || -> JobFuture {
            Box::pin(async move {
                let outcome = work().await;
                // The submitter may have dropped its handle; the outcome is
                // simply discarded then.
                let _ = sender.send(outcome);
            })
        });

        let (sequence, start_worker) = {
            let mut state = self.shared.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.items.push_back(QueueItem {
                sequence,
                enqueued_at: Instant::now(),
                job,
            });

            let start_worker = !state.draining;
            state.draining = true;
            (sequence, start_worker)
        };

        trace!(sequence, "Operation enqueued");

        if start_worker {
            runtime.spawn(drain(Arc::clone(&self.shared)));
        }

        QueuedResult {
            inner: ResultState::Pending { sequence, receiver },
        }
    }

    /// Run `work` immediately, outside the queue.
    ///
    /// Bypassed work does not wait for queued items and has no ordering
    /// guarantee relative to them.
    pub async fn bypass<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        trace!("Operation bypassing queue");
        work().await
    }
}

/// Resets the queue if the drain loop stops without reaching an empty
/// sequence, e.g. because its runtime shut down or the task was aborted.
///
/// Leftover items are dropped, which resolves their handles with
/// `QueueError::ItemAbandoned`, and the queue returns to `Idle` so a later
/// submission starts a new worker.
struct DrainGuard {
    shared: Arc<Shared>,
    finished: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let abandoned = {
            let mut state = self.shared.lock();
            state.draining = false;
            std::mem::take(&mut state.items)
        };

        // Jobs are dropped outside the lock; they may own arbitrary user values.
        if !abandoned.is_empty() {
            error!(
                abandoned = abandoned.len(),
                "Queue worker stopped early; abandoning pending operations"
            );
        }
        drop(abandoned);
    }
}

/// The drain loop. Exactly one instance runs per queue while it is draining.
async fn drain(shared: Arc<Shared>) {
    debug!("Queue drain loop started");

    let mut guard = DrainGuard {
        shared,
        finished: false,
    };

    loop {
        let item = {
            let mut state = guard.shared.lock();
            match state.items.pop_front() {
                Some(item) => item,
                None => {
                    // Observing the empty sequence and clearing the flag under
                    // one lock means no submission can be stranded.
                    state.draining = false;
                    guard.finished = true;
                    break;
                }
            }
        };

        let sequence = item.sequence;
        trace!(
            sequence,
            queue_wait_ms = item.enqueued_at.elapsed().as_millis() as u64,
            "Executing queued operation"
        );

        if let Err(join_error) = tokio::spawn((item.job)()).await {
            error!(
                sequence,
                error = %join_error,
                "Queued operation was abandoned"
            );
        }

        tokio::time::sleep(guard.shared.inter_item_delay).await;
    }

    debug!("Queue drained; worker idle");
}

enum ResultState<T, E> {
    Pending {
        sequence: u64,
        receiver: oneshot::Receiver<Result<T, E>>,
    },
    Failed(Option<QueueError>),
}

/// Eventual outcome of a queued unit of work.
///
/// Resolves to the work's own `Result`, or to `E::from(QueueError)` if the
/// work could not deliver one.
#[must_use = "the outcome of a queued operation is only observable by awaiting it"]
pub struct QueuedResult<T, E> {
    inner: ResultState<T, E>,
}

impl<T, E> QueuedResult<T, E> {
    fn failed(error: QueueError) -> Self {
        Self {
            inner: ResultState::Failed(Some(error)),
        }
    }

    /// Position of this item in submission order, or `None` if it was never
    /// enqueued.
    pub fn sequence(&self) -> Option<u64> {
        match &self.inner {
            ResultState::Pending { sequence, .. } => Some(*sequence),
            ResultState::Failed(_) => None,
        }
    }
}

impl<T, E> Future for QueuedResult<T, E>
where
    E: From<QueueError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            ResultState::Pending { sequence, receiver } => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::ItemAbandoned {
                    sequence: *sequence,
                }
                .into())),
                Poll::Pending => Poll::Pending,
            },
            // Only submissions without a runtime are never enqueued.
            ResultState::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or(QueueError::NoRuntime)
                .into())),
        }
    }
}

impl<T, E> std::fmt::Debug for QueuedResult<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedResult")
            .field("sequence", &self.sequence())
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
