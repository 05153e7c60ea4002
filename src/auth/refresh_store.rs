use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgPool};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::AuthResult;

/// A refresh token as handed to the store for persistence.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Server-side record of the refresh token each user may currently redeem.
///
/// Implementations keep at most one live token per user.
#[rocket::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Drop every stored token for the record's user and store the record.
    async fn replace(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Consume `presented` and store `replacement` in one atomic step.
    ///
    /// Returns false, leaving the store untouched, when `presented` is not the
    /// live unexpired token of `replacement.user_id`.
    async fn rotate(&self, presented: &str, replacement: &RefreshTokenRecord)
    -> AuthResult<bool>;

    async fn contains(&self, user_id: Uuid, token: &str) -> AuthResult<bool>;

    async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn replace(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        // The unique key on user_id turns the upsert into delete-all-then-insert.
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET token_hash = EXCLUDED.token_hash,
                          expires_at = EXCLUDED.expires_at,
                          created_at = now()
            "#,
        )
        .bind(record.user_id)
        .bind(hash_token(&record.token))
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
    ) -> AuthResult<bool> {
        // Concurrent callers serialize on the row lock; the loser re-evaluates
        // the WHERE clause against the new hash and matches nothing.
        let rotated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $3, expires_at = $4, created_at = now()
            WHERE user_id = $1 AND token_hash = $2 AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(replacement.user_id)
        .bind(hash_token(presented))
        .bind(hash_token(&replacement.token))
        .bind(replacement.expires_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rotated.is_some())
    }

    async fn contains(&self, user_id: Uuid, token: &str) -> AuthResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2 AND expires_at > now())",
        )
        .bind(user_id)
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Digest stored in place of the token itself.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    STANDARD_NO_PAD.encode(digest)
}
