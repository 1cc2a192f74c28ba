//! Redis-backed lock store
//!
//! Implements [`LockStore`] against Redis. Acquisition uses `SET key token
//! NX PX ms`, a single atomic command; release and refresh run as
//! server-side Lua so the owner check and the mutation cannot be
//! interleaved with another client. Leases have millisecond precision.

use std::time::Duration;

use async_trait::async_trait;
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface, LuaInterface};
use fred::prelude::{Builder, Config};
use fred::types::{Expiration, SetOptions};
use tracing::debug;

use distlock::LockStore;

/// Delete the key only if it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Reset the key's expiration only if it still holds the caller's token.
const REFRESH_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// [`LockStore`] backed by a fred connection pool.
pub struct RedisLockStore {
    pool: Pool,
}

impl RedisLockStore {
    /// Wrap an already-connected pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect a pool of `pool_size` connections to `url`
    /// (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str, pool_size: usize) -> anyhow::Result<Self> {
        let config = Config::from_url(url)?;
        let pool = Builder::from_config(config).build_pool(pool_size)?;
        pool.init().await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<bool> {
        // SET ... NX returns "OK" when the key was set, nil otherwise.
        let result: Option<String> = self
            .pool
            .set(
                key,
                token,
                Some(Expiration::PX(lease.as_millis() as i64)),
                Some(SetOptions::NX),
                false,
            )
            .await?;
        let acquired = result.is_some();
        debug!(key = %key, acquired, "redis acquire");
        Ok(acquired)
    }

    async fn release(&self, key: &str, token: &str) -> anyhow::Result<u64> {
        let released: i64 = self
            .pool
            .eval(
                RELEASE_SCRIPT,
                vec![key.to_string()],
                vec![token.to_string()],
            )
            .await?;
        debug!(key = %key, released, "redis release");
        Ok(released as u64)
    }

    async fn refresh(&self, key: &str, token: &str, lease: Duration) -> anyhow::Result<u64> {
        let refreshed: i64 = self
            .pool
            .eval(
                REFRESH_SCRIPT,
                vec![key.to_string()],
                vec![
                    token.to_string(),
                    lease.as_millis().to_string(),
                ],
            )
            .await?;
        debug!(key = %key, refreshed, "redis refresh");
        Ok(refreshed as u64)
    }
}
