//! Password reset tokens and payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::types::{PasswordResetId, UserId};
use crate::validation::rules::validate_password_strength;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedBy {
    Admin,
    #[sqlx(rename = "SELF")]
    #[serde(rename = "SELF")]
    SelfService,
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: PasswordResetId,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub requested_by: RequestedBy,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub reset_version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ValidateTokenQuery {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_by_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&RequestedBy::SelfService).unwrap(),
            "\"SELF\""
        );
        assert_eq!(serde_json::to_string(&RequestedBy::Admin).unwrap(), "\"ADMIN\"");
    }
}
