use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    models::timesheet::{
        ClientTimesheetQuery, CreateTimesheetRequest, MonthlyTimesheetQuery, PaymentRequest,
        Timesheet, UpdateTimesheetRequest,
    },
    state::AppState,
    types::{ClientId, TimesheetId},
};

pub async fn list_all_timesheets(
    State(state): State<AppState>,
) -> Result<Json<Vec<Timesheet>>, AppError> {
    Ok(Json(state.timesheets().list_all().await?))
}

pub async fn get_timesheet(
    State(state): State<AppState>,
    Path(id): Path<TimesheetId>,
) -> Result<Json<Timesheet>, AppError> {
    Ok(Json(state.timesheets().get(id).await?))
}

pub async fn list_client_timesheets(
    State(state): State<AppState>,
    Path(client_id): Path<ClientId>,
    Query(query): Query<ClientTimesheetQuery>,
) -> Result<Json<Vec<Timesheet>>, AppError> {
    Ok(Json(
        state
            .timesheets()
            .list_for_client(client_id, query.invoiced)
            .await?,
    ))
}

pub async fn list_monthly_timesheets(
    State(state): State<AppState>,
    Query(query): Query<MonthlyTimesheetQuery>,
) -> Result<Json<Vec<Timesheet>>, AppError> {
    Ok(Json(
        state
            .timesheets()
            .list_monthly(query.client_id, query.year, query.month)
            .await?,
    ))
}

pub async fn list_unbilled_timesheets(
    State(state): State<AppState>,
) -> Result<Json<Vec<Timesheet>>, AppError> {
    Ok(Json(state.timesheets().list_unbilled().await?))
}

pub async fn create_timesheet(
    State(state): State<AppState>,
    Json(payload): Json<CreateTimesheetRequest>,
) -> Result<(StatusCode, Json<Timesheet>), AppError> {
    let timesheet = state.timesheets().create(payload).await?;
    Ok((StatusCode::CREATED, Json(timesheet)))
}

pub async fn update_timesheet(
    State(state): State<AppState>,
    Path(id): Path<TimesheetId>,
    Json(payload): Json<UpdateTimesheetRequest>,
) -> Result<Json<Timesheet>, AppError> {
    Ok(Json(state.timesheets().update(id, payload).await?))
}

pub async fn delete_timesheet(
    State(state): State<AppState>,
    Path(id): Path<TimesheetId>,
) -> Result<StatusCode, AppError> {
    state.timesheets().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn detach_timesheet(
    State(state): State<AppState>,
    Path(id): Path<TimesheetId>,
) -> Result<Json<Timesheet>, AppError> {
    Ok(Json(state.timesheets().detach(id).await?))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<TimesheetId>,
    payload: Option<Json<PaymentRequest>>,
) -> Result<Json<Timesheet>, AppError> {
    let payment_date = payload.and_then(|Json(body)| body.payment_date);
    Ok(Json(state.timesheets().mark_paid(id, payment_date).await?))
}
