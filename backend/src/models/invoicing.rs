//! Monthly invoicing run results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::client::Client;
use crate::models::invoice::Invoice;
use crate::types::ClientId;

/// Outcome for one client in a run. `invoice` is `None` when the invoice
/// could not even be created.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceProcessingResult {
    pub client_id: ClientId,
    pub client_name: String,
    pub invoice: Option<Invoice>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl InvoiceProcessingResult {
    pub fn sent(invoice: Invoice) -> Self {
        Self {
            client_id: invoice.client_id,
            client_name: invoice.client_name.clone(),
            invoice: Some(invoice),
            success: true,
            error_message: None,
        }
    }

    pub fn send_failed(invoice: Invoice, error_message: String) -> Self {
        Self {
            client_id: invoice.client_id,
            client_name: invoice.client_name.clone(),
            invoice: Some(invoice),
            success: false,
            error_message: Some(error_message),
        }
    }

    pub fn not_created(client_id: ClientId, client_name: String, error_message: String) -> Self {
        Self {
            client_id,
            client_name,
            invoice: None,
            success: false,
            error_message: Some(error_message),
        }
    }
}

/// Body of `POST /api/v1/invoices/monthly/generate`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyGenerationResponse {
    pub invoices: Vec<Invoice>,
    pub failures: Vec<ClientBillingError>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientBillingError {
    pub client_id: ClientId,
    pub client_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoicingSummary {
    pub execution_time: DateTime<Utc>,
    pub period_year: i32,
    pub period_month: u32,
    /// "March 2026"
    pub period: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub clients_without_timesheets: Vec<Client>,
    /// Set when the clients-without-timesheets lookup itself failed, in which
    /// case the list above is not meaningful.
    pub empty_client_check_error: Option<String>,
    pub processing_results: Vec<InvoiceProcessingResult>,
}

impl InvoicingSummary {
    /// Whole-percent success rate; 0 when nothing was processed.
    pub fn success_rate(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.successful as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, successful: usize) -> InvoicingSummary {
        InvoicingSummary {
            execution_time: Utc::now(),
            period_year: 2026,
            period_month: 1,
            period: "January 2026".into(),
            total,
            successful,
            failed: total - successful,
            clients_without_timesheets: vec![],
            empty_client_check_error: None,
            processing_results: vec![],
        }
    }

    #[test]
    fn success_rate_rounds_and_handles_empty_runs() {
        assert_eq!(summary(0, 0).success_rate(), 0);
        assert_eq!(summary(3, 2).success_rate(), 67);
        assert_eq!(summary(4, 4).success_rate(), 100);
    }
}
