//! Password reset by emailed one-time token.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::PgPool;
use validator::Validate;

use crate::config::{Config, PasswordResetConfig};
use crate::error::AppError;
use crate::models::password_reset::{
    PasswordResetToken, RequestedBy, ResetPasswordRequest, ValidateTokenResponse,
};
use crate::models::user::User;
use crate::repositories::password_reset::{self as tokens, NewResetToken};
use crate::repositories::{begin_transaction, commit_transaction, UserRepository};
use crate::types::UserId;
use crate::utils::email::{escape_html, Mailer, OutgoingEmail};
use crate::utils::security::{generate_token, hash_password, sha256_hex};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If that email exists in our system, a reset link has been sent.";
const TOKEN_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResetTokenError {
    #[error("Invalid or unknown reset token")]
    InvalidToken,
    #[error("Reset token has already been used")]
    TokenAlreadyUsed,
    #[error("Reset token has expired")]
    TokenExpired,
}

/// A found token is usable only when unused and unexpired.
pub fn check_token_state(
    token: &PasswordResetToken,
    now: DateTime<Utc>,
) -> Result<(), ResetTokenError> {
    if token.used_at.is_some() {
        return Err(ResetTokenError::TokenAlreadyUsed);
    }
    if token.expires_at < now {
        return Err(ResetTokenError::TokenExpired);
    }
    Ok(())
}

/// In-memory sliding-window limiter keyed by client IP and by email digest.
pub struct ResetRateLimiter {
    ip_max: usize,
    email_max: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl ResetRateLimiter {
    pub fn new(config: &PasswordResetConfig) -> Self {
        Self {
            ip_max: config.ip_max_attempts.max(1),
            email_max: config.email_max_attempts.max(1),
            window: Duration::from_secs(config.window_seconds.max(1)),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, ip: Option<&str>, email: &str) -> Result<(), AppError> {
        self.check_at(ip, email, Instant::now())
    }

    fn check_at(&self, ip: Option<&str>, email: &str, now: Instant) -> Result<(), AppError> {
        let mut keys: Vec<(String, usize)> = Vec::with_capacity(2);
        if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
            keys.push((format!("ip:{}", ip), self.ip_max));
        }
        keys.push((
            format!("email:{}", sha256_hex(&email.trim().to_lowercase())),
            self.email_max,
        ));

        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        attempts.retain(|_, window| {
            prune(window, now, self.window);
            !window.is_empty()
        });

        for (key, max) in &keys {
            if let Some(window) = attempts.get(key) {
                if window.len() >= *max {
                    let retry_after_secs = window
                        .front()
                        .map(|oldest| {
                            self.window
                                .saturating_sub(now.duration_since(*oldest))
                                .as_secs()
                                .max(1)
                        })
                        .unwrap_or(1);
                    tracing::warn!(key_kind = key.split(':').next().unwrap_or(""), "Password reset rate limit hit");
                    return Err(AppError::TooManyRequests {
                        message: "Too many password reset attempts. Please try again later."
                            .into(),
                        retry_after_secs,
                    });
                }
            }
        }
        for (key, _) in keys {
            attempts.entry(key).or_default().push_back(now);
        }
        Ok(())
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

/// Where the request came from; stored with the token.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct PasswordResetService {
    pool: PgPool,
    users: UserRepository,
    mailer: Arc<dyn Mailer>,
    limiter: Arc<ResetRateLimiter>,
    settings: PasswordResetConfig,
    base_url: String,
}

impl PasswordResetService {
    pub fn new(
        pool: PgPool,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        limiter: Arc<ResetRateLimiter>,
    ) -> Self {
        Self {
            pool,
            users: UserRepository::new(),
            mailer,
            limiter,
            settings: config.password_reset.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ttl(&self, requested_by: RequestedBy) -> chrono::Duration {
        match requested_by {
            RequestedBy::Admin => chrono::Duration::minutes(self.settings.admin_ttl_minutes),
            RequestedBy::SelfService => chrono::Duration::minutes(self.settings.self_ttl_minutes),
        }
    }

    /// Stores a fresh token (spending any older unused ones) and returns the
    /// plaintext to email.
    async fn issue_token(
        &self,
        user: &User,
        requested_by: RequestedBy,
        origin: &RequestOrigin,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let plaintext = generate_token();
        let digest = sha256_hex(&plaintext);
        let now = Utc::now();
        let expires_at = now + self.ttl(requested_by);

        let mut tx = begin_transaction(&self.pool).await?;
        let invalidated = tokens::invalidate_unused_for_user(&mut tx, user.id, now).await?;
        tokens::insert_token(
            &mut tx,
            &NewResetToken {
                user_id: user.id,
                token_hash: &digest,
                expires_at,
                requested_by,
                request_ip: origin.ip.as_deref(),
                user_agent: origin.user_agent.as_deref(),
                reset_version: user.token_version,
            },
        )
        .await?;
        commit_transaction(tx).await?;

        tracing::info!(
            user_id = %user.id,
            requested_by = ?requested_by,
            invalidated,
            "Password reset token issued"
        );
        Ok((plaintext, expires_at))
    }

    fn reset_email(&self, user: &User, to: &str, token: &str, expires_at: DateTime<Utc>) -> OutgoingEmail {
        let link = format!("{}/reset-password?token={}", self.base_url, token);
        let body = format!(
            "<p>Hello {},</p>\
             <p>A password reset was requested for your account. \
             Use the link below to choose a new password:</p>\
             <p><a href=\"{link}\">{link}</a></p>\
             <p>The link expires at {} UTC and can be used once.</p>\
             <p>If you did not request this, you can ignore this email.</p>",
            escape_html(&user.username),
            expires_at.format("%Y-%m-%d %H:%M"),
            link = escape_html(&link),
        );
        OutgoingEmail::html(to, "Password reset", body)
    }

    /// Self-service request. Succeeds whether or not the email is known.
    pub async fn request_reset(&self, email: &str, origin: &RequestOrigin) -> Result<(), AppError> {
        self.limiter.check(origin.ip.as_deref(), email)?;

        let user = match self.users.find_by_email(&self.pool, email).await? {
            Some(user) if user.active => user,
            _ => {
                let delay = rand::thread_rng().gen_range(100..=200);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                tracing::debug!("Password reset requested for unknown or inactive email");
                return Ok(());
            }
        };
        let Some(to) = user.email.clone() else {
            return Ok(());
        };

        let (token, expires_at) = self
            .issue_token(&user, RequestedBy::SelfService, origin)
            .await?;
        if let Err(err) = self
            .mailer
            .send(self.reset_email(&user, &to, &token, expires_at))
            .await
        {
            tracing::error!(user_id = %user.id, error = %format!("{:#}", err), "Failed to send password reset email");
        }
        Ok(())
    }

    /// Admin-triggered reset for a specific user.
    pub async fn request_reset_for_user(
        &self,
        user_id: UserId,
        origin: &RequestOrigin,
    ) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let to = user
            .email
            .clone()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AppError::BusinessRule("User has no email address".into()))?;

        let (token, expires_at) = self.issue_token(&user, RequestedBy::Admin, origin).await?;
        self.mailer
            .send(self.reset_email(&user, &to, &token, expires_at))
            .await
            .map_err(|err| {
                AppError::Integration(format!("Failed to send password reset email: {:#}", err))
            })?;
        Ok(())
    }

    pub async fn validate(&self, token: &str) -> Result<ValidateTokenResponse, AppError> {
        let stored = tokens::find_by_hash(&self.pool, &sha256_hex(token.trim()))
            .await?
            .ok_or(ResetTokenError::InvalidToken)?;
        check_token_state(&stored, Utc::now())?;
        let user = self
            .users
            .find_by_id(&self.pool, stored.user_id)
            .await?
            .ok_or(ResetTokenError::InvalidToken)?;
        Ok(ValidateTokenResponse {
            valid: true,
            username: user.username,
            expires_at: stored.expires_at,
        })
    }

    /// Sets the new password and spends the token in one transaction.
    pub async fn consume(&self, req: &ResetPasswordRequest) -> Result<(), AppError> {
        req.validate()?;
        let digest = sha256_hex(req.token.trim());
        let now = Utc::now();

        let mut tx = begin_transaction(&self.pool).await?;
        let stored = tokens::find_by_hash_for_update(&mut tx, &digest)
            .await?
            .ok_or(ResetTokenError::InvalidToken)?;
        check_token_state(&stored, now)?;

        let password_hash = hash_password(&req.new_password)?;
        self.users
            .update_password_after_reset(&mut tx, stored.user_id, &password_hash, now)
            .await?;
        tokens::mark_used(&mut tx, stored.id, now).await?;
        commit_transaction(tx).await?;

        tracing::info!(user_id = %stored.user_id, "Password reset completed");
        Ok(())
    }

    pub async fn cleanup_old_tokens(&self) -> Result<u64, AppError> {
        cleanup_old_tokens(&self.pool).await
    }
}

/// Removes tokens created more than a week ago.
pub async fn cleanup_old_tokens(pool: &PgPool) -> Result<u64, AppError> {
    let cutoff = Utc::now() - chrono::Duration::days(TOKEN_RETENTION_DAYS);
    let deleted = tokens::delete_created_before(pool, cutoff).await?;
    tracing::info!(deleted, cutoff = %cutoff, "Old password reset tokens removed");
    Ok(deleted)
}
