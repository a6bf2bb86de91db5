//! User accounts, roles, and authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{SellerId, UserId};
use crate::validation::rules::{validate_password_strength, validate_username};

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_USER: &str = "ROLE_USER";

/// Database representation of a user account with its role names.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub active: bool,
    pub default_seller_id: Option<SellerId>,
    pub token_version: i32,
    pub requires_password_change: bool,
    pub last_password_changed_at: Option<DateTime<Utc>>,
    pub last_password_reset_at: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ROLE_ADMIN)
    }
}

/// API shape of a user; never exposes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub active: bool,
    pub default_seller_id: Option<SellerId>,
    pub requires_password_change: bool,
    pub roles: Vec<String>,
    pub last_password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            active: user.active,
            default_seller_id: user.default_seller_id,
            requires_password_change: user.requires_password_change,
            roles: user.roles,
            last_password_changed_at: user.last_password_changed_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[validate(email)]
    pub email: Option<String>,
    /// Defaults to `["ROLE_USER"]`.
    #[serde(default)]
    pub roles: Vec<String>,
    pub default_seller_id: Option<SellerId>,
    /// Force a password change on first login.
    #[serde(default = "default_true")]
    pub requires_password_change: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DefaultSellerRequest {
    pub seller_id: Option<SellerId>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub requires_password_change: bool,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_defaults() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "username": "anna",
            "password": "secret123"
        }))
        .unwrap();
        assert!(req.requires_password_change);
        assert!(req.roles.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn weak_new_password_rejected() {
        let req = ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "short".into(),
        };
        assert!(req.validate().is_err());
    }
}
