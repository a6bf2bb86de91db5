use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};

use crate::{
    error::AppError,
    handlers::{request_origin, ClientAddr},
    models::{
        user::{
            CreateUserRequest, DefaultSellerRequest, UpdateRolesRequest, UpdateUserRequest, User,
            UserResponse,
        },
        MessageResponse,
    },
    state::AppState,
    types::UserId,
};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    Ok(Json(state.users().list().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users().get(id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.users().create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users().update(id, payload).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(acting): Extension<User>,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    state.users().delete(&acting, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_roles(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(payload): Json<UpdateRolesRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users().update_roles(id, payload).await?))
}

pub async fn activate_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users().set_active(id, true).await?))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users().set_active(id, false).await?))
}

pub async fn set_default_seller(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(payload): Json<DefaultSellerRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(
        state
            .users()
            .set_default_seller(id, payload.seller_id)
            .await?,
    ))
}

/// Emails the user a reset link with the admin TTL.
pub async fn admin_reset_password(
    State(state): State<AppState>,
    ClientAddr(peer): ClientAddr,
    headers: HeaderMap,
    Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>, AppError> {
    let origin = request_origin(&headers, peer);
    state
        .password_reset()
        .request_reset_for_user(id, &origin)
        .await?;
    Ok(Json(MessageResponse::new("Password reset email sent")))
}
