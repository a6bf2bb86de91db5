//! Password reset token persistence. Only SHA-256 digests of tokens are stored.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::models::password_reset::{PasswordResetToken, RequestedBy};
use crate::types::{PasswordResetId, UserId};

const SELECT_COLUMNS: &str = "id, user_id, token_hash, expires_at, used_at, requested_by, \
     request_ip, user_agent, reset_version, created_at";

#[derive(Debug, Clone)]
pub struct NewResetToken<'a> {
    pub user_id: UserId,
    pub token_hash: &'a str,
    pub expires_at: DateTime<Utc>,
    pub requested_by: RequestedBy,
    pub request_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub reset_version: i32,
}

/// Marks the user's other unused tokens as spent.
pub async fn invalidate_unused_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used_at = $2 WHERE user_id = $1 AND used_at IS NULL",
    )
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_token(
    conn: &mut PgConnection,
    token: &NewResetToken<'_>,
) -> Result<PasswordResetToken, AppError> {
    let query = format!(
        "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, requested_by, \
         request_ip, user_agent, reset_version) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {}",
        SELECT_COLUMNS
    );
    let row = sqlx::query_as::<_, PasswordResetToken>(&query)
        .bind(PasswordResetId::new())
        .bind(token.user_id)
        .bind(token.token_hash)
        .bind(token.expires_at)
        .bind(token.requested_by)
        .bind(token.request_ip)
        .bind(token.user_agent)
        .bind(token.reset_version)
        .fetch_one(conn)
        .await?;
    Ok(row)
}

pub async fn find_by_hash(
    db: &PgPool,
    token_hash: &str,
) -> Result<Option<PasswordResetToken>, AppError> {
    let query = format!(
        "SELECT {} FROM password_reset_tokens WHERE token_hash = $1",
        SELECT_COLUMNS
    );
    let row = sqlx::query_as::<_, PasswordResetToken>(&query)
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Locks the token row for the duration of the consuming transaction.
pub async fn find_by_hash_for_update(
    conn: &mut PgConnection,
    token_hash: &str,
) -> Result<Option<PasswordResetToken>, AppError> {
    let query = format!(
        "SELECT {} FROM password_reset_tokens WHERE token_hash = $1 FOR UPDATE",
        SELECT_COLUMNS
    );
    let row = sqlx::query_as::<_, PasswordResetToken>(&query)
        .bind(token_hash)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn mark_used(
    conn: &mut PgConnection,
    id: PasswordResetId,
    at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE password_reset_tokens SET used_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_created_before(db: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM password_reset_tokens WHERE created_at < $1")
        .bind(cutoff)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
