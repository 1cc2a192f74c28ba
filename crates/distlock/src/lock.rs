//! Held-lease handle

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{LockError, Result};
use crate::renew::AutoRenewer;
use crate::signal::CancelSignal;
use crate::store::LockStore;

/// Everything a lease operation needs, shared between the owning [`Lock`]
/// and an optional renewer task.
pub(crate) struct LeaseState {
    pub(crate) store: Arc<dyn LockStore>,
    pub(crate) key: String,
    pub(crate) token: String,
    pub(crate) lease: Duration,
    pub(crate) timeout: Duration,
}

impl LeaseState {
    /// One owner-checked refresh, bounded by the per-call timeout.
    pub(crate) async fn refresh_once(&self) -> Result<()> {
        let refreshed = tokio::time::timeout(
            self.timeout,
            self.store.refresh(&self.key, &self.token, self.lease),
        )
        .await
        .map_err(|_| LockError::Timeout)?
        .map_err(LockError::Store)?;

        if refreshed == 0 {
            return Err(LockError::NotHeld);
        }
        debug!(key = %self.key, "Lease refreshed");
        Ok(())
    }
}

/// A successful acquisition of one named resource.
///
/// The handle is tied to the ownership token generated for its
/// acquisition: only this handle (and a renewer spawned from it) can
/// release or extend the lease, and the store rejects both once the token
/// no longer matches. A `Lock` has a single logical owner; it is not
/// `Clone` and is never reused for a different acquisition.
pub struct Lock {
    pub(crate) state: Arc<LeaseState>,
}

impl Lock {
    pub(crate) fn new(
        store: Arc<dyn LockStore>,
        key: String,
        token: String,
        lease: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            state: Arc::new(LeaseState {
                store,
                key,
                token,
                lease,
                timeout,
            }),
        }
    }

    /// The resource key this lock claims.
    pub fn key(&self) -> &str {
        &self.state.key
    }

    /// The ownership token generated for this acquisition.
    pub fn token(&self) -> &str {
        &self.state.token
    }

    /// Release the lease: delete the key only if it still carries this
    /// lock's token.
    ///
    /// [`LockError::NotHeld`] means the token no longer matched: the lease
    /// expired, was taken over, or was already released. The resource is
    /// free either way, so callers treat a `NotHeld` double release as
    /// success-equivalent.
    pub async fn release(&self, cancel: &CancelSignal) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }

        let released = tokio::time::timeout(
            self.state.timeout,
            self.state.store.release(&self.state.key, &self.state.token),
        )
        .await
        .map_err(|_| LockError::Timeout)?
        .map_err(LockError::Store)?;

        if released == 0 {
            return Err(LockError::NotHeld);
        }
        debug!(key = %self.state.key, "Lock released");
        Ok(())
    }

    /// Extend the lease back to its full duration, only if the key still
    /// carries this lock's token. The only mechanism for extending a
    /// lease; a holder that already lost ownership gets
    /// [`LockError::NotHeld`] and can never re-extend.
    pub async fn refresh(&self, cancel: &CancelSignal) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }
        self.state.refresh_once().await
    }

    /// Spawn an [`AutoRenewer`] refreshing this lease every `interval`
    /// until stopped or terminally failed, with up to `max_retries`
    /// immediate retries per tick on timeout.
    ///
    /// Stop the renewer before calling [`Lock::release`] in the normal
    /// path; a terminal error from the renewer then always means the lease
    /// was lost unexpectedly.
    pub fn auto_renew(&self, interval: Duration, max_retries: u32) -> AutoRenewer {
        AutoRenewer::spawn(self, interval, max_retries)
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.state.key)
            .field("lease", &self.state.lease)
            .finish()
    }
}
