use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::numbering::{
        CounterListQuery, CreateSchemeRequest, InvoiceNumberCounter, NumberingScheme,
        PreviewTemplateRequest, PreviewTemplateResponse, SchemeListQuery,
    },
    state::AppState,
    types::NumberingSchemeId,
};

pub async fn list_schemes(
    State(state): State<AppState>,
    Query(query): Query<SchemeListQuery>,
) -> Result<Json<Vec<NumberingScheme>>, AppError> {
    Ok(Json(
        state.numbering().list_schemes(query.seller_id, false).await?,
    ))
}

pub async fn list_active_schemes(
    State(state): State<AppState>,
    Query(query): Query<SchemeListQuery>,
) -> Result<Json<Vec<NumberingScheme>>, AppError> {
    Ok(Json(
        state.numbering().list_schemes(query.seller_id, true).await?,
    ))
}

pub async fn create_scheme(
    State(state): State<AppState>,
    Json(payload): Json<CreateSchemeRequest>,
) -> Result<(StatusCode, Json<NumberingScheme>), AppError> {
    payload.validate()?;
    let scheme = state.numbering().create_scheme(&payload).await?;
    Ok((StatusCode::CREATED, Json(scheme)))
}

pub async fn archive_scheme(
    State(state): State<AppState>,
    Path(id): Path<NumberingSchemeId>,
) -> Result<StatusCode, AppError> {
    state.numbering().archive_scheme(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn preview_template(
    State(state): State<AppState>,
    Json(payload): Json<PreviewTemplateRequest>,
) -> Result<Json<PreviewTemplateResponse>, AppError> {
    payload.validate()?;
    Ok(Json(state.numbering().preview(payload.template.trim())?))
}

pub async fn list_counters(
    State(state): State<AppState>,
    Query(query): Query<CounterListQuery>,
) -> Result<Json<Vec<InvoiceNumberCounter>>, AppError> {
    Ok(Json(state.numbering().list_counters(query.seller_id).await?))
}
