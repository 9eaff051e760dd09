/// Refresh Token Management
///
/// Refresh tokens are opaque random strings checked against durable storage,
/// so they can be revoked and survive signing-secret rotation.
/// - 32 bytes from the OS CSPRNG, hex-encoded
/// - Stored as a SHA-256 hash, never in plaintext
/// - Not rotated on use: one token keeps minting access tokens until it
///   expires or is revoked

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::error::{RefreshTokenError, RepositoryError};

pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 3650;

const TOKEN_BYTES: usize = 32;
const ISSUE_ATTEMPTS: usize = 3;

/// Server-side state of one refresh token
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Generate a new refresh token in plaintext (what the client keeps)
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Storage key for a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Persistence collaborator for refresh token records
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    /// `RepositoryError::Conflict` if the hash is already present
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError>;

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;

    /// Set `revoked_at` unless it is already set.
    ///
    /// Returns `false` when no record has this hash.
    async fn mark_revoked(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Revoke every unrevoked record of a user, returning how many changed.
    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

/// PostgreSQL-backed repository (table `refresh_tokens`)
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, user_id, created_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token_hash, user_id, created_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn mark_revoked(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // COALESCE keeps the first revocation time under concurrent revokes.
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = COALESCE(revoked_at, $1)
            WHERE token_hash = $2
            "#,
        )
        .bind(at)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $1
            WHERE user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local repository for tests and the `memory` storage backend
#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, RefreshTokenRecord>>, RepositoryError>
    {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Backend("refresh token map poisoned".to_string()))
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError> {
        let mut records = self.records()?;
        if records.contains_key(&record.token_hash) {
            return Err(RepositoryError::Conflict("refresh_tokens_pkey".to_string()));
        }
        records.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        Ok(self.records()?.get(token_hash).cloned())
    }

    async fn mark_revoked(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        match self.records()?.get_mut(token_hash) {
            Some(record) => {
                record.revoked_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut revoked = 0;
        for record in self.records()?.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

/// Issues, resolves and revokes refresh tokens
#[derive(Clone)]
pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    clock: Arc<dyn Clock>,
}

impl RefreshTokenStore {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Issue a token for `owner` valid for `ttl`, returning the plaintext.
    ///
    /// A uniqueness conflict in the repository triggers a fresh token, up to
    /// three attempts in total.
    pub async fn issue(&self, owner: Uuid, ttl: Duration) -> Result<String, RefreshTokenError> {
        let mut last_conflict = None;

        for attempt in 1..=ISSUE_ATTEMPTS {
            let token = generate_refresh_token();
            let now = self.clock.now();
            let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
                RefreshTokenError::Storage("refresh token expiry out of range".to_string())
            })?;
            let record = RefreshTokenRecord {
                token_hash: hash_token(&token),
                user_id: owner,
                created_at: now,
                expires_at,
                revoked_at: None,
            };

            match self.repository.insert(&record).await {
                Ok(()) => {
                    tracing::debug!(user_id = %owner, "Refresh token issued");
                    return Ok(token);
                }
                Err(RepositoryError::Conflict(msg)) => {
                    tracing::warn!(user_id = %owner, attempt, "Refresh token collision, retrying");
                    last_conflict = Some(RepositoryError::Conflict(msg));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .map(RefreshTokenError::from)
            .unwrap_or_else(|| RefreshTokenError::Storage("no issue attempt made".to_string())))
    }

    /// Resolve a token to its live record.
    ///
    /// # Errors
    /// `NotFound`, `Revoked`, or `Expired` once `now >= expires_at`
    pub async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, RefreshTokenError> {
        let record = self
            .repository
            .find_by_hash(&hash_token(token))
            .await?
            .ok_or(RefreshTokenError::NotFound)?;

        if record.revoked_at.is_some() {
            tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
            return Err(RefreshTokenError::Revoked);
        }

        if self.clock.now() >= record.expires_at {
            tracing::info!(user_id = %record.user_id, "Refresh token expired");
            return Err(RefreshTokenError::Expired);
        }

        Ok(record)
    }

    /// Revoke a token. Revoking twice is not an error.
    ///
    /// # Errors
    /// `NotFound` if the token was never issued
    pub async fn revoke(&self, token: &str) -> Result<(), RefreshTokenError> {
        let found = self
            .repository
            .mark_revoked(&hash_token(token), self.clock.now())
            .await?;

        if found {
            Ok(())
        } else {
            Err(RefreshTokenError::NotFound)
        }
    }

    /// Revoke every outstanding token of `owner`.
    pub async fn revoke_all_for_user(&self, owner: Uuid) -> Result<u64, RefreshTokenError> {
        let revoked = self
            .repository
            .revoke_all_for_user(owner, self.clock.now())
            .await?;

        tracing::info!(user_id = %owner, revoked, "All refresh tokens revoked for user");
        Ok(revoked)
    }
}
