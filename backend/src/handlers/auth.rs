use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    handlers::{request_origin, ClientAddr},
    models::{
        password_reset::{
            ForgotPasswordRequest, ResetPasswordRequest, ValidateTokenQuery, ValidateTokenResponse,
        },
        user::{ChangePasswordRequest, LoginRequest, LoginResponse, User, UserResponse},
        MessageResponse,
    },
    services::password_reset::FORGOT_PASSWORD_MESSAGE,
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangePasswordResponse {
    pub message: String,
    /// Replacement token; tokens issued before the change stop working.
    pub access_token: String,
    pub token_type: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(state.auth().login(&payload).await?))
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    let access_token = state.auth().change_password(&user, &payload).await?;
    Ok(Json(ChangePasswordResponse {
        message: "Password changed successfully".into(),
        access_token,
        token_type: "Bearer".into(),
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ClientAddr(peer): ClientAddr,
    headers: HeaderMap,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let origin = request_origin(&headers, peer);
    state
        .password_reset()
        .request_reset(payload.email.trim(), &origin)
        .await?;
    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

pub async fn validate_reset_token(
    State(state): State<AppState>,
    Query(query): Query<ValidateTokenQuery>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    Ok(Json(state.password_reset().validate(&query.token).await?))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.password_reset().consume(&payload).await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset. You can now log in.",
    )))
}
