//! Tests for the retry module

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

/// Work that fails on the first `failures` calls and then returns the call count.
fn flaky_work(
    calls: Arc<AtomicU32>,
    failures: u32,
) -> impl FnMut() -> std::future::Ready<Result<u32, String>> {
    move || {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= failures {
            std::future::ready(Err(format!("failure on call {}", call)))
        } else {
            std::future::ready(Ok(call))
        }
    }
}

// ============================================================================
// RetryPolicy Tests
// ============================================================================

#[test]
fn test_retry_policy_default_values() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.max_attempts, 8);
    assert_eq!(policy.delay, Duration::from_secs(60));
}

#[test]
fn test_retry_policy_last_attempt() {
    let policy = RetryPolicy::new(3, Duration::ZERO);

    assert!(!policy.is_last_attempt(0));
    assert!(!policy.is_last_attempt(1));
    assert!(policy.is_last_attempt(2));
}

#[test]
fn test_retry_policy_zero_attempts_runs_once() {
    let policy = RetryPolicy::new(0, Duration::ZERO);

    assert_eq!(policy.effective_attempts(), 1);
    assert!(policy.is_last_attempt(0));
}

// ============================================================================
// RetryExecutor Tests
// ============================================================================

/// Always-failing work is invoked exactly `max_attempts` times and the
/// failure of the final attempt is surfaced.
#[tokio::test]
async fn test_retry_bound_surfaces_last_failure() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = run_with_retry(
        flaky_work(calls.clone(), u32::MAX),
        3,
        Duration::ZERO,
        "always-fails",
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result, Err("failure on call 3".to_string()));
}

/// Work that fails twice and then succeeds stops retrying on success.
#[tokio::test]
async fn test_retry_success_after_failures() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = run_with_retry(flaky_work(calls.clone(), 2), 5, Duration::ZERO, "flaky").await;

    assert_eq!(result, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_first_attempt_success_does_not_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::default();

    let result = executor.run("healthy", flaky_work(calls.clone(), 0)).await;

    assert_eq!(result, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_attempts_still_invokes_work_once() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = run_with_retry(flaky_work(calls.clone(), u32::MAX), 0, Duration::ZERO, "zero").await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(result.is_err());
}

/// The executor sleeps the fixed delay between attempts, and not after the
/// terminal failure.
#[tokio::test(start_paused = true)]
async fn test_fixed_delay_between_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(RetryPolicy::new(3, Duration::from_secs(60)));

    let started = tokio::time::Instant::now();
    let result = executor
        .run("delayed", flaky_work(calls.clone(), u32::MAX))
        .await;

    assert!(result.is_err());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(120), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(121), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_not_exponential() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(RetryPolicy::new(5, Duration::from_secs(10)));

    let started = tokio::time::Instant::now();
    let result = executor.run("linear", flaky_work(calls.clone(), 4)).await;

    assert_eq!(result, Ok(5));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(40), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(41), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_run_with_overrides_policy() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(RetryPolicy::new(8, Duration::from_secs(60)));

    let result = executor
        .run_with(
            &RetryPolicy::new(2, Duration::ZERO),
            "override",
            flaky_work(calls.clone(), u32::MAX),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(executor.policy().max_attempts, 8);
}

#[tokio::test]
async fn test_silenced_executor_keeps_results() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(RetryPolicy::new(2, Duration::ZERO)).silenced(true);

    let result = executor
        .run("quiet", flaky_work(calls.clone(), u32::MAX))
        .await;

    assert_eq!(result, Err("failure on call 2".to_string()));
}

// ============================================================================
// Diagnostics Tests
// ============================================================================

mod diagnostics_tests {
    use super::*;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run one failing-then-succeeding operation and return the retry line.
    async fn retry_log_line(silent: bool) -> String {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(RetryPolicy::new(3, Duration::ZERO)).silenced(silent);
        let result = executor.run("flaky", flaky_work(calls, 1)).await;
        assert_eq!(result, Ok(2));

        logs.contents()
            .lines()
            .find(|line| line.contains("Operation failed; retrying"))
            .expect("Retry should be logged")
            .to_string()
    }

    /// Verify silencing only changes the level of the retry line, not its fields.
    #[tokio::test]
    async fn test_silent_retry_log_keeps_fields() {
        let loud = retry_log_line(false).await;
        let quiet = retry_log_line(true).await;

        assert!(loud.contains("WARN"));
        assert!(quiet.contains("DEBUG"));
        for line in [&loud, &quiet] {
            assert!(line.contains("attempt=1"), "missing attempt in {}", line);
            assert!(line.contains("max_attempts=3"), "missing max_attempts in {}", line);
            assert!(line.contains("delay_ms=0"), "missing delay_ms in {}", line);
            assert!(line.contains("failure on call 1"), "missing error in {}", line);
        }
    }
}
