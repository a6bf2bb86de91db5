use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::{ChangePasswordRequest, LoginRequest, LoginResponse, User, UserResponse};
use crate::repositories::UserRepository;
use crate::utils::jwt::{create_access_token, Claims};
use crate::utils::security::{hash_password, verify_password};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    users: UserRepository,
    jwt_secret: String,
    jwt_expiration_hours: u64,
}

impl AuthService {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            users: UserRepository::new(),
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiration_hours: config.jwt_expiration_hours,
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        let claims = Claims::new(
            user.id.to_string(),
            user.username.clone(),
            user.roles.clone(),
            user.token_version,
            self.jwt_expiration_hours,
        );
        Ok(create_access_token(&claims, &self.jwt_secret)?)
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AppError> {
        req.validate()?;
        let user = self
            .users
            .find_by_username(&self.pool, req.username.trim())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;
        if !verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(username = %user.username, "Login failed: bad password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        if !user.active {
            tracing::warn!(username = %user.username, "Login refused: account inactive");
            return Err(AppError::Unauthorized("Account is inactive".into()));
        }

        let access_token = self.issue_token(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".into(),
            requires_password_change: user.requires_password_change,
            user: UserResponse::from(user),
        })
    }

    /// Changes the password and returns a token for the new token version.
    pub async fn change_password(
        &self,
        user: &User,
        req: &ChangePasswordRequest,
    ) -> Result<String, AppError> {
        req.validate()?;
        if req.new_password == req.current_password {
            return Err(AppError::BadRequest(
                "New password must differ from current password".into(),
            ));
        }
        if !verify_password(&req.current_password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Current password is incorrect".into()));
        }

        let new_hash = hash_password(&req.new_password)?;
        self.users
            .update_password_after_change(&self.pool, user.id, &new_hash, Utc::now())
            .await?;
        let refreshed = self
            .users
            .find_by_id(&self.pool, user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        tracing::info!(user_id = %user.id, "Password changed");
        self.issue_token(&refreshed)
    }
}
