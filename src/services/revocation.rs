use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::{MySql, Pool};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tokens are stored hashed so the table never holds usable credentials.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Set of invalidated bearer tokens, consulted before any token is trusted.
///
/// Entries expire after a fixed TTL; that bounds growth because every issued
/// token's own expiry is shorter than the TTL, so nothing valid is forgotten.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Idempotent: revoking an already-revoked token succeeds.
    async fn revoke(&self, token: &str) -> Result<(), RevocationError>;
    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError>;
    /// Remove entries older than the TTL. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, RevocationError>;
}

pub struct MySqlRevocationStore {
    pool: Pool<MySql>,
    ttl: Duration,
}

impl MySqlRevocationStore {
    pub fn new(pool: Pool<MySql>, ttl_hours: i64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours),
        }
    }
}

#[async_trait]
impl RevocationStore for MySqlRevocationStore {
    async fn revoke(&self, token: &str) -> Result<(), RevocationError> {
        let result = sqlx::query("INSERT INTO revoked_tokens (token_hash, created_at) VALUES (?, ?)")
            .bind(token_digest(token))
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!("token already revoked");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM revoked_tokens WHERE token_hash = ?")
                .bind(token_digest(token))
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0 > 0)
    }

    async fn purge_expired(&self) -> Result<u64, RevocationError> {
        let cutoff = Utc::now() - self.ttl;
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local store for single-instance deployments and tests.
pub struct InMemoryRevocationStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token: &str) -> Result<(), RevocationError> {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(token_digest(token)).or_insert_with(Utc::now);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let cutoff = Utc::now() - self.ttl;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(&token_digest(token))
            .map(|created| *created > cutoff)
            .unwrap_or(false))
    }

    async fn purge_expired(&self) -> Result<u64, RevocationError> {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, created| *created > cutoff);
        Ok((before - entries.len()) as u64)
    }
}
