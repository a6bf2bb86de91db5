use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::{
    error::AppError,
    models::{invoice::GenerateMonthlyRequest, invoicing::InvoicingSummary, user::User},
    state::AppState,
};

/// Runs the monthly invoicing job now. Without a body it bills the previous
/// month, exactly like the cron trigger.
pub async fn run_invoicing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    payload: Option<Json<GenerateMonthlyRequest>>,
) -> Result<Json<InvoicingSummary>, AppError> {
    let job = state.invoicing_job();
    let summary = match payload {
        Some(Json(period)) => {
            period.validate()?;
            tracing::info!(user_id = %user.id, year = period.year, month = period.month, "Manual invoicing run");
            job.run_for(period.year, period.month).await?
        }
        None => {
            tracing::info!(user_id = %user.id, "Manual invoicing run for previous month");
            job.run().await?
        }
    };
    Ok(Json(summary))
}
