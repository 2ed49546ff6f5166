//! Access-token blacklist
//!
//! Revocation set consulted on every authenticated request. The backing
//! store is chosen at startup: Redis when available (entries expire with
//! the access-token TTL), otherwise a process-local set.

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::RwLock;

/// Revocation set for access tokens
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Revoke a token
    async fn add(&self, token: &str) -> Result<()>;

    /// Check whether a token has been revoked
    async fn contains(&self, token: &str) -> Result<bool>;
}

/// Process-local blacklist
///
/// Entries live until the process exits; suitable for development and
/// single-instance deployments.
#[derive(Default)]
pub struct InMemoryBlacklist {
    revoked: RwLock<HashSet<String>>,
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryBlacklist {
    async fn add(&self, token: &str) -> Result<()> {
        self.revoked
            .write()
            .map_err(|_| anyhow::anyhow!("blacklist lock poisoned"))?
            .insert(token.to_string());
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        Ok(self
            .revoked
            .read()
            .map_err(|_| anyhow::anyhow!("blacklist lock poisoned"))?
            .contains(token))
    }
}

/// Redis-backed blacklist
///
/// Entries are written with a TTL equal to the access-token lifetime, so
/// they expire together with the tokens they revoke.
pub struct RedisBlacklist {
    conn: ConnectionManager,
    ttl_secs: usize,
}

impl RedisBlacklist {
    pub fn new(conn: ConnectionManager, ttl_secs: usize) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(token: &str) -> String {
        format!("revoked:{token}")
    }
}

#[async_trait]
impl TokenBlacklist for RedisBlacklist {
    async fn add(&self, token: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::key(token), 1u8, self.ttl_secs as u64).await?;
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::key(token)).await?;
        Ok(exists)
    }
}
