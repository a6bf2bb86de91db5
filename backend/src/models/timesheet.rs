//! Timesheets: one row per unit of billable work.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::types::{ClientId, InvoiceId, TimesheetId};
use crate::utils::money::line_amount;
use crate::validation::rules::{validate_duration, validate_rate};

/// A timesheet joined with the owning client's name and current rate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Timesheet {
    pub id: TimesheetId,
    pub client_id: ClientId,
    pub client_name: String,
    pub service_date: NaiveDate,
    /// Hours worked.
    pub duration: Decimal,
    /// Rate snapshot; `None` means "use the client's rate".
    pub hourly_rate: Option<Decimal>,
    pub client_hourly_rate: Decimal,
    pub invoiced: bool,
    pub invoice_id: Option<InvoiceId>,
    pub payment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timesheet {
    pub fn effective_rate(&self) -> Decimal {
        self.hourly_rate.unwrap_or(self.client_hourly_rate)
    }

    pub fn amount(&self) -> Decimal {
        line_amount(self.duration, self.effective_rate())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTimesheetRequest {
    pub client_id: ClientId,
    pub service_date: NaiveDate,
    #[validate(custom(function = "validate_duration"))]
    pub duration: Decimal,
    #[validate(custom(function = "validate_rate"))]
    pub hourly_rate: Option<Decimal>,
    /// Already settled outside an invoice; stamps the payment date.
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateTimesheetRequest {
    pub client_id: ClientId,
    pub service_date: NaiveDate,
    #[validate(custom(function = "validate_duration"))]
    pub duration: Decimal,
    #[validate(custom(function = "validate_rate"))]
    pub hourly_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// Defaults to today in the configured timezone.
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ClientTimesheetQuery {
    pub invoiced: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct MonthlyTimesheetQuery {
    pub client_id: ClientId,
    pub year: i32,
    pub month: u32,
}
