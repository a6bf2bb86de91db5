use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        invoice::{
            CreateInvoiceRequest, DeleteInvoiceQuery, GenerateMonthlyRequest, Invoice,
            InvoiceDetail, InvoiceListQuery, InvoicePreview, InvoiceReport, InvoiceReportQuery,
            MonthlyInvoiceQuery, UpdateInvoiceRequest, YearlyInvoiceQuery,
        },
        invoicing::{ClientBillingError, MonthlyGenerationResponse},
        PaginatedResponse,
    },
    state::AppState,
    types::InvoiceId,
};

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<PaginatedResponse<Invoice>>, AppError> {
    Ok(Json(state.invoices().list(&query).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<InvoiceDetail>, AppError> {
    Ok(Json(state.invoices().get_detail(id).await?))
}

pub async fn get_invoice_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<InvoiceDetail>, AppError> {
    Ok(Json(state.invoices().get_by_number(&number).await?))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    let detail = state.billing().create_from_request(&payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn preview_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<Json<InvoicePreview>, AppError> {
    Ok(Json(state.billing().build_invoice_preview(&payload).await?))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceDetail>, AppError> {
    Ok(Json(state.invoices().update_invoice(id, payload).await?))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Query(query): Query<DeleteInvoiceQuery>,
) -> Result<StatusCode, AppError> {
    state
        .invoices()
        .delete_invoice(id, query.delete_timesheets)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_pdf(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Response, AppError> {
    let (filename, bytes) = state.invoices().pdf(id).await?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|_| AppError::BadRequest("Invoice number is not a valid file name".into()))?;

    let mut response = Body::from(bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// Renders, stores and emails the invoice.
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.documents().save_pdf_and_send(id).await?))
}

pub async fn list_monthly_invoices(
    State(state): State<AppState>,
    Query(query): Query<MonthlyInvoiceQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(
        state
            .invoices()
            .list_monthly(query.client_id, query.year, query.month)
            .await?,
    ))
}

pub async fn list_yearly_invoices(
    State(state): State<AppState>,
    Query(query): Query<YearlyInvoiceQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(
        state
            .invoices()
            .list_yearly(query.client_id, query.year)
            .await?,
    ))
}

pub async fn invoice_report(
    State(state): State<AppState>,
    Query(query): Query<InvoiceReportQuery>,
) -> Result<Json<InvoiceReport>, AppError> {
    Ok(Json(state.invoices().generate_report(&query).await?))
}

pub async fn generate_monthly_invoices(
    State(state): State<AppState>,
    Json(payload): Json<GenerateMonthlyRequest>,
) -> Result<(StatusCode, Json<MonthlyGenerationResponse>), AppError> {
    payload.validate()?;
    let generation = state
        .billing()
        .generate_monthly_invoices(payload.year, payload.month)
        .await?;
    let failures = generation
        .failures
        .into_iter()
        .map(|failure| ClientBillingError {
            client_id: failure.client_id,
            client_name: failure.client_name,
            error: failure.error.public_message(),
        })
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(MonthlyGenerationResponse {
            invoices: generation.created,
            failures,
        }),
    ))
}
