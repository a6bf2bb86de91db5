use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::{
        seller::{Seller, SellerRequest},
        IncludeInactiveQuery, NameSearchQuery,
    },
    state::AppState,
    types::SellerId,
};

pub async fn list_sellers(
    State(state): State<AppState>,
    Query(query): Query<IncludeInactiveQuery>,
) -> Result<Json<Vec<Seller>>, AppError> {
    Ok(Json(state.sellers().list(query.include_inactive).await?))
}

pub async fn get_seller(
    State(state): State<AppState>,
    Path(id): Path<SellerId>,
) -> Result<Json<Seller>, AppError> {
    Ok(Json(state.sellers().get(id).await?))
}

pub async fn search_sellers(
    State(state): State<AppState>,
    Query(query): Query<NameSearchQuery>,
) -> Result<Json<Vec<Seller>>, AppError> {
    Ok(Json(state.sellers().search(&query.name).await?))
}

pub async fn create_seller(
    State(state): State<AppState>,
    Json(payload): Json<SellerRequest>,
) -> Result<(StatusCode, Json<Seller>), AppError> {
    let seller = state.sellers().create(payload).await?;
    Ok((StatusCode::CREATED, Json(seller)))
}

pub async fn update_seller(
    State(state): State<AppState>,
    Path(id): Path<SellerId>,
    Json(payload): Json<SellerRequest>,
) -> Result<Json<Seller>, AppError> {
    Ok(Json(state.sellers().update(id, payload).await?))
}

pub async fn deactivate_seller(
    State(state): State<AppState>,
    Path(id): Path<SellerId>,
) -> Result<StatusCode, AppError> {
    state.sellers().deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
