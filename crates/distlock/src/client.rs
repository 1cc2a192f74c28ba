//! Lock client: acquisition with contention handling

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LockError, Result};
use crate::lock::Lock;
use crate::retry::RetryStrategy;
use crate::signal::CancelSignal;
use crate::store::LockStore;

const DEFAULT_LEASE: Duration = Duration::from_secs(30);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Client turning a resource key into a held [`Lock`].
///
/// Construction is builder-style; the client is immutable afterwards and
/// cheap to share across tasks. Every acquisition generates its own v4
/// UUID ownership token, so locks taken through one client can never
/// release or extend each other's leases.
pub struct LockClient {
    store: Arc<dyn LockStore>,
    lease: Duration,
    timeout: Duration,
    retry: Option<Arc<dyn RetryStrategy>>,
}

impl LockClient {
    /// Create a client with the default lease (30s), per-call timeout (3s)
    /// and no retry strategy.
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            lease: DEFAULT_LEASE,
            timeout: DEFAULT_TIMEOUT,
            retry: None,
        }
    }

    /// Set the default lease duration applied to acquisitions.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Set the per-call bound applied to every store operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the wait policy consulted when the lock is contended.
    pub fn with_retry(mut self, retry: impl RetryStrategy + 'static) -> Self {
        self.retry = Some(Arc::new(retry));
        self
    }

    /// Acquire `key`, waiting out contention according to the configured
    /// retry strategy.
    ///
    /// Each attempt is one atomic set-if-absent bounded by the per-call
    /// timeout. Contention and attempt timeouts consume retries; any other
    /// store error is surfaced immediately. With no strategy configured a
    /// single contended attempt fails with [`LockError::Unavailable`].
    /// `cancel` is honored between attempts: a signal set before the call
    /// or fired during a retry sleep fails the acquisition with
    /// [`LockError::Cancelled`] without waiting out the interval.
    pub async fn acquire(&self, key: &str, cancel: &CancelSignal) -> Result<Lock> {
        self.acquire_inner(key, self.lease, self.timeout, true, cancel)
            .await
    }

    /// A single, non-retried attempt with caller-supplied lease and
    /// per-call timeout overriding the client defaults.
    pub async fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> Result<Lock> {
        self.acquire_inner(key, lease, timeout, false, cancel).await
    }

    async fn acquire_inner(
        &self,
        key: &str,
        lease: Duration,
        timeout: Duration,
        use_retry: bool,
        cancel: &CancelSignal,
    ) -> Result<Lock> {
        if key.is_empty() {
            return Err(LockError::EmptyKey);
        }
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }

        let token = Uuid::new_v4().to_string();
        let mut attempts: u32 = 0;

        loop {
            let outcome =
                tokio::time::timeout(timeout, self.store.acquire(key, &token, lease)).await;
            attempts += 1;

            let last = match outcome {
                Ok(Ok(true)) => {
                    debug!(key = %key, attempts, "Lock acquired");
                    return Ok(Lock::new(
                        self.store.clone(),
                        key.to_string(),
                        token,
                        lease,
                        timeout,
                    ));
                }
                // Held by someone else
                Ok(Ok(false)) => LockError::Unavailable,
                // Non-timeout store failure: surfaced immediately, never
                // retried as contention
                Ok(Err(err)) => return Err(LockError::Store(err)),
                Err(_) => LockError::Timeout,
            };

            let strategy = match (use_retry, &self.retry) {
                (true, Some(strategy)) => strategy,
                _ => return Err(last),
            };

            let Some(wait) = strategy.next(attempts) else {
                warn!(key = %key, attempts, "Lock retries exhausted");
                return Err(LockError::RetryExhausted {
                    last: Box::new(last),
                });
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

impl std::fmt::Debug for LockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockClient")
            .field("lease", &self.lease)
            .field("timeout", &self.timeout)
            .field("has_retry", &self.retry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FixedInterval;
    use crate::store::MemoryLockStore;

    fn test_client() -> LockClient {
        LockClient::new(Arc::new(MemoryLockStore::new()))
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let client = test_client();
        let cancel = CancelSignal::new();

        let err = client.acquire("", &cancel).await.unwrap_err();
        assert!(matches!(err, LockError::EmptyKey));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let client = test_client();
        let cancel = CancelSignal::new();
        cancel.cancel();

        let err = client.acquire("job:1", &cancel).await.unwrap_err();
        assert!(matches!(err, LockError::Cancelled));
    }

    #[tokio::test]
    async fn test_acquire_generates_distinct_tokens() {
        let client = test_client();
        let cancel = CancelSignal::new();

        let a = client.acquire("job:1", &cancel).await.unwrap();
        let b = client.acquire("job:2", &cancel).await.unwrap();
        assert_ne!(a.token(), b.token());
    }

    #[tokio::test]
    async fn test_single_attempt_without_strategy() {
        let client = test_client();
        let cancel = CancelSignal::new();

        let _held = client.acquire("job:1", &cancel).await.unwrap();

        let err = client.acquire("job:1", &cancel).await.unwrap_err();
        assert!(matches!(err, LockError::Unavailable));
    }

    #[tokio::test]
    async fn test_try_acquire_never_retries() {
        let store = Arc::new(MemoryLockStore::new());
        let client = LockClient::new(store.clone())
            .with_retry(FixedInterval::new(Duration::from_secs(5), 10));
        let cancel = CancelSignal::new();

        let _held = client.acquire("job:1", &cancel).await.unwrap();

        // Despite the configured strategy, try_acquire fails straight away
        let started = std::time::Instant::now();
        let err = client
            .try_acquire("job:1", Duration::from_secs(2), Duration::from_secs(1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Unavailable));
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
