//! Store seam: the three atomic operations the lock client depends on

mod memory;

pub use memory::MemoryLockStore;

use std::time::Duration;

use async_trait::async_trait;

/// The atomic key/value operations distributed locking is built on.
///
/// Each method must execute as a single indivisible operation on the store
/// (a server-side script, a conditional command, a guarded map entry);
/// a read followed by a separate write reopens the race this client exists
/// to close. Errors are opaque transport failures; the client maps them to
/// [`LockError::Store`](crate::LockError::Store).
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `token` with expiration `lease`, only if `key` does not
    /// currently exist. Returns whether the value was set.
    async fn acquire(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<bool>;

    /// Delete `key` only if its current value equals `token`. Returns the
    /// number of keys deleted (0 or 1).
    async fn release(&self, key: &str, token: &str) -> anyhow::Result<u64>;

    /// Reset the expiration of `key` to `lease` only if its current value
    /// equals `token`. Returns 1 if the expiration was reset, 0 otherwise.
    async fn refresh(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<u64>;
}
