use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::{
        client::{Client, ClientRequest},
        IncludeInactiveQuery, NameSearchQuery,
    },
    state::AppState,
    types::ClientId,
};

pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<IncludeInactiveQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.clients().list(query.include_inactive).await?))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.clients().get(id).await?))
}

pub async fn search_clients(
    State(state): State<AppState>,
    Query(query): Query<NameSearchQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.clients().search(&query.name).await?))
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<ClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let client = state.clients().create(payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
    Json(payload): Json<ClientRequest>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.clients().update(id, payload).await?))
}

/// Soft delete: the client stays on its invoices.
pub async fn deactivate_client(
    State(state): State<AppState>,
    Path(id): Path<ClientId>,
) -> Result<StatusCode, AppError> {
    state.clients().deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
