//! Distlock - distributed mutual-exclusion lock client
//!
//! This crate provides:
//! - A lock client coordinating exclusive access to named resources through
//!   a shared key/value store (`LockClient`)
//! - A held-lease handle with owner-checked release and refresh (`Lock`)
//! - Background lease renewal for long critical sections (`AutoRenewer`)
//! - Pluggable wait policies for contended acquisition (`RetryStrategy`)
//! - The store seam the client depends on (`LockStore`) plus an in-memory
//!   implementation (`MemoryLockStore`)
//!
//! The client never assumes mutual exclusion locally: every acquisition,
//! release and renewal is verified through one of the store's three atomic
//! operations. A Redis-backed store lives in the `distlock-redis` crate.

pub mod client;
pub mod error;
pub mod lock;
pub mod renew;
pub mod retry;
pub mod signal;
pub mod store;

// Re-export the client surface
pub use client::LockClient;
pub use error::{LockError, Result};
pub use lock::Lock;
pub use renew::AutoRenewer;

// Re-export retry strategies
pub use retry::{ExponentialBackoff, FixedInterval, RandomizedInterval, RetryStrategy};

// Re-export the store seam
pub use signal::CancelSignal;
pub use store::{LockStore, MemoryLockStore};
