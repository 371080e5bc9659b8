//! Opaque refresh tokens and their session rows.
//!
//! The token itself never touches the database; only its SHA-256 digest is
//! stored, so a leaked sessions table cannot be replayed.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config;
use crate::error::CoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Generate a new opaque refresh token (256 bits of v4-uuid randomness).
pub fn generate_refresh_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Record a session row for a freshly issued refresh token.
pub async fn create_session(
    pool: &PgPool,
    principal_id: Uuid,
    token: &str,
) -> Result<(), CoreError> {
    let ttl_days = config::config().security.refresh_ttl_days;
    let expires_at = Utc::now() + Duration::days(ttl_days);

    sqlx::query("INSERT INTO sessions (principal_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(principal_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// Look up the live session for a presented refresh token. Expired or
/// unknown tokens are indistinguishable to the caller.
pub async fn find_valid_session(pool: &PgPool, token: &str) -> Result<Option<Session>, CoreError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, principal_id, token_hash, created_at, expires_at
         FROM sessions WHERE token_hash = $1 AND expires_at > now()",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// Rotate a refresh token: record the replacement, then retire the presented
/// one. In that order, so a failure between the two steps leaves the client
/// with at least one working token instead of none.
pub async fn rotate_session(
    pool: &PgPool,
    session_id: Uuid,
    principal_id: Uuid,
    new_token: &str,
) -> Result<(), CoreError> {
    create_session(pool, principal_id, new_token).await?;

    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove every session for a principal (teardown step 2). Idempotent.
pub async fn delete_for_principal(pool: &PgPool, principal_id: Uuid) -> Result<u64, CoreError> {
    let result = sqlx::query("DELETE FROM sessions WHERE principal_id = $1")
        .bind(principal_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
