//! In-memory lock store
//!
//! Process-local [`LockStore`] backed by a DashMap. Entries expire lazily
//! on access; an optional background sweep reclaims entries nobody touches
//! again. Used by the integration tests and usable as a real store when
//! all contenders share one process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::LockStore;

struct LeaseEntry {
    token: String,
    deadline: Instant,
}

impl LeaseEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// In-memory lock store using DashMap
pub struct MemoryLockStore {
    leases: Arc<DashMap<String, LeaseEntry>>,
    _cleanup_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self {
            leases: Arc::new(DashMap::new()),
            _cleanup_handle: None,
        }
    }

    /// Start a background task sweeping out expired entries every
    /// `interval`. Correctness does not depend on the sweep; expired
    /// entries are already treated as absent on access.
    pub fn with_cleanup(self, interval: Duration) -> Self {
        let leases = self.leases.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let expired: Vec<String> = leases
                    .iter()
                    .filter(|entry| entry.value().is_expired())
                    .map(|entry| entry.key().clone())
                    .collect();

                for key in &expired {
                    // Re-check under the entry lock: the key may have been
                    // re-acquired since the scan.
                    leases.remove_if(key, |_, entry| entry.is_expired());
                }

                if !expired.is_empty() {
                    debug!(count = expired.len(), "Swept expired lease entries");
                }
            }
        });

        Self {
            leases: self.leases,
            _cleanup_handle: Some(handle),
        }
    }

    /// Number of live (unexpired) leases, for tests and introspection.
    pub fn live_leases(&self) -> usize {
        self.leases
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .count()
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn acquire(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<bool> {
        // The entry API holds the shard lock across the check and insert,
        // which is what makes this set-if-absent atomic.
        let acquired = match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(LeaseEntry {
                        token: token.to_string(),
                        deadline: Instant::now() + lease,
                    });
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LeaseEntry {
                    token: token.to_string(),
                    deadline: Instant::now() + lease,
                });
                true
            }
        };
        Ok(acquired)
    }

    async fn release(&self, key: &str, token: &str) -> anyhow::Result<u64> {
        let removed = self
            .leases
            .remove_if(key, |_, entry| !entry.is_expired() && entry.token == token);
        Ok(removed.is_some() as u64)
    }

    async fn refresh(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<u64> {
        if let Some(mut entry) = self.leases.get_mut(key) {
            if !entry.is_expired() && entry.token == token {
                entry.deadline = Instant::now() + lease;
                return Ok(1);
            }
        }
        Ok(0)
    }
}
