//! Invoices and their line items.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::PaginationQuery;
use crate::types::{ClientId, InvoiceId, InvoiceItemId, NumberingSchemeId, SellerId, TimesheetId};
use crate::validation::rules::{validate_duration, validate_rate};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub total_amount: Decimal,
    pub client_id: ClientId,
    pub client_name: String,
    pub seller_id: SellerId,
    pub sequence_number: i32,
    pub period_year: i32,
    pub period_month: i32,
    pub numbering_scheme_id: Option<NumberingSchemeId>,
    pub pdf_path: Option<String>,
    pub pdf_generated_at: Option<DateTime<Utc>>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_tracking_token: Option<Uuid>,
    pub email_opened_at: Option<DateTime<Utc>>,
    pub last_email_opened_at: Option<DateTime<Utc>>,
    pub email_open_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Invoice number made safe for use as a file name.
    pub fn file_stem(&self) -> String {
        sanitize_invoice_number(&self.invoice_number)
    }
}

pub fn sanitize_invoice_number(number: &str) -> String {
    number.replace('/', "-")
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub position: i32,
    pub service_date: NaiveDate,
    pub description: String,
    pub duration: Decimal,
    pub hourly_rate: Decimal,
    pub amount: Decimal,
    pub timesheet_id: Option<TimesheetId>,
}

/// A line computed before it is written.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InvoiceItemDraft {
    pub service_date: NaiveDate,
    pub description: String,
    pub duration: Decimal,
    pub hourly_rate: Decimal,
    pub amount: Decimal,
    pub timesheet_id: Option<TimesheetId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoicePreview {
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub client_id: ClientId,
    pub client_name: String,
    pub seller_id: SellerId,
    pub items: Vec<InvoiceItemDraft>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateInvoiceRequest {
    pub client_id: ClientId,
    pub seller_id: SellerId,
    pub issue_date: NaiveDate,
    pub timesheet_ids: Vec<TimesheetId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateInvoiceItemRequest {
    pub timesheet_id: Option<TimesheetId>,
    pub service_date: NaiveDate,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = "validate_duration"))]
    pub duration: Decimal,
    #[validate(custom(function = "validate_rate"))]
    pub hourly_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateInvoiceRequest {
    pub client_id: ClientId,
    pub issue_date: NaiveDate,
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<UpdateInvoiceItemRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct InvoiceListQuery {
    pub client_id: Option<ClientId>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl InvoiceListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        let defaults = PaginationQuery::default();
        PaginationQuery {
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DeleteInvoiceQuery {
    #[serde(default)]
    pub delete_timesheets: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct MonthlyInvoiceQuery {
    pub client_id: ClientId,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct YearlyInvoiceQuery {
    pub client_id: ClientId,
    pub year: i32,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct InvoiceReportQuery {
    pub from_year: Option<i32>,
    pub from_month: Option<u32>,
    pub to_year: Option<i32>,
    pub to_month: Option<u32>,
    pub client_id: Option<ClientId>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceReport {
    pub invoices: Vec<Invoice>,
    pub total_amount: Decimal,
    pub period_label: String,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateMonthlyRequest {
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_numbers_with_slashes_become_file_safe() {
        assert_eq!(sanitize_invoice_number("INV/2026/001"), "INV-2026-001");
        assert_eq!(sanitize_invoice_number("001-01-2026"), "001-01-2026");
    }

    #[test]
    fn list_query_falls_back_to_default_page() {
        let page = InvoiceListQuery::default().pagination();
        assert_eq!(page.limit(), 50);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn generate_request_rejects_month_13() {
        let req = GenerateMonthlyRequest {
            year: 2026,
            month: 13,
        };
        assert!(req.validate().is_err());
    }
}
