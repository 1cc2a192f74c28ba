//! Error types for lock client operations

/// Error type for lock acquisition, release and renewal
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The resource is currently held by someone else. Recoverable: retry
    /// later.
    #[error("lock unavailable")]
    Unavailable,

    /// The configured retry strategy ran out of attempts. `last` is the
    /// outcome of the final attempt: [`LockError::Unavailable`] when the
    /// lock stayed contended, [`LockError::Timeout`] when the final store
    /// call timed out.
    #[error("retries exhausted: {last}")]
    RetryExhausted {
        #[source]
        last: Box<LockError>,
    },

    /// The stored token no longer matches: the lease expired, was taken by
    /// another holder, or was already released. Recoverable: stop treating
    /// the resource as owned.
    #[error("not holding lock")]
    NotHeld,

    /// A single store call exceeded its per-call bound.
    #[error("store call timed out")]
    Timeout,

    /// The caller's cancel signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Lock keys must be non-empty.
    #[error("lock key must not be empty")]
    EmptyKey,

    /// Any other store failure. Surfaced immediately, never retried as
    /// contention.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl LockError {
    /// True for outcomes that mean "someone else holds the resource right
    /// now": plain contention or contention that outlasted every retry.
    pub fn is_contention(&self) -> bool {
        match self {
            LockError::Unavailable => true,
            LockError::RetryExhausted { last } => last.is_contention(),
            _ => false,
        }
    }

    /// True when the caller's claim on the lease is gone.
    pub fn is_not_held(&self) -> bool {
        matches!(self, LockError::NotHeld)
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
