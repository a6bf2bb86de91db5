//! Monthly invoicing run: bill last month, send every invoice, report back.

use chrono::Utc;
use chrono_tz::Tz;
use sqlx::PgPool;

use crate::config::InvoicingConfig;
use crate::error::AppError;
use crate::models::client::Client;
use crate::models::invoicing::{InvoiceProcessingResult, InvoicingSummary};
use crate::repositories::ClientRepository;
use crate::services::admin_notification::AdminNotificationService;
use crate::services::billing::BillingService;
use crate::services::document::InvoiceDocumentService;
use crate::utils::time::{month_bounds, month_label, previous_month, today_local, year_month};

pub const CRITICAL_FAILURE_SUBJECT: &str = "CRITICAL: Scheduled invoicing task failed";

/// The month before the one `today` falls in.
pub fn target_period(today: chrono::NaiveDate) -> (i32, u32) {
    let (year, month) = year_month(today);
    // A calendar date always has a month in 1..=12.
    previous_month(year, month).unwrap_or((year - 1, 12))
}

#[derive(Clone)]
pub struct MonthlyInvoicingJob {
    pool: PgPool,
    billing: BillingService,
    documents: InvoiceDocumentService,
    notifications: AdminNotificationService,
    clients: ClientRepository,
    settings: InvoicingConfig,
    time_zone: Tz,
}

impl MonthlyInvoicingJob {
    pub fn new(
        pool: PgPool,
        documents: InvoiceDocumentService,
        notifications: AdminNotificationService,
        settings: InvoicingConfig,
        time_zone: Tz,
    ) -> Self {
        Self {
            billing: BillingService::new(pool.clone()),
            pool,
            documents,
            notifications,
            clients: ClientRepository::new(),
            settings,
            time_zone,
        }
    }

    /// Runs for the previous calendar month in the configured zone.
    pub async fn run(&self) -> Result<InvoicingSummary, AppError> {
        let (year, month) = target_period(today_local(&self.time_zone));
        self.run_for(year, month).await
    }

    pub async fn run_for(&self, year: i32, month: u32) -> Result<InvoicingSummary, AppError> {
        let execution_time = Utc::now();
        let period = month_label(year, month);
        tracing::info!(period = %period, "Monthly invoicing started");

        let generation = match self.billing.generate_monthly_invoices(year, month).await {
            Ok(generation) => generation,
            Err(err) => {
                tracing::error!(period = %period, error = %err, "Monthly invoicing failed");
                self.notifications
                    .send_error_notification(
                        CRITICAL_FAILURE_SUBJECT,
                        &format!("Invoice generation for {} could not run", period),
                        &err,
                    )
                    .await;
                return Err(err);
            }
        };

        let mut processing_results =
            Vec::with_capacity(generation.created.len() + generation.failures.len());
        for failure in generation.failures {
            self.notifications
                .send_error_notification(
                    &format!("Invoice Processing Error: {}", failure.client_name),
                    &format!(
                        "No invoice could be created for {} ({})",
                        failure.client_name, period
                    ),
                    &failure.error,
                )
                .await;
            processing_results.push(InvoiceProcessingResult::not_created(
                failure.client_id,
                failure.client_name,
                failure.error.public_message(),
            ));
        }

        for invoice in generation.created {
            match self.documents.save_pdf_and_send(invoice.id).await {
                Ok(sent) => processing_results.push(InvoiceProcessingResult::sent(sent)),
                Err(err) => {
                    tracing::error!(
                        invoice_number = %invoice.invoice_number,
                        error = %err,
                        "Invoice processing failed"
                    );
                    self.notifications
                        .send_error_notification(
                            &format!("Invoice Processing Error: {}", invoice.invoice_number),
                            &format!(
                                "Invoice {} for {} ({}) was created but could not be sent",
                                invoice.invoice_number, invoice.client_name, period
                            ),
                            &err,
                        )
                        .await;
                    processing_results.push(InvoiceProcessingResult::send_failed(
                        invoice,
                        err.public_message(),
                    ));
                }
            }
        }

        let (clients_without_timesheets, empty_client_check_error) =
            match self.clients_without_timesheets(year, month).await {
                Ok(clients) => (clients, None),
                Err(err) => {
                    tracing::error!(
                        period = %period,
                        error = %err,
                        "Could not list clients without timesheets"
                    );
                    (Vec::new(), Some(err.public_message()))
                }
            };

        let successful = processing_results.iter().filter(|r| r.success).count();
        let summary = InvoicingSummary {
            execution_time,
            period_year: year,
            period_month: month,
            period: period.clone(),
            total: processing_results.len(),
            successful,
            failed: processing_results.len() - successful,
            clients_without_timesheets,
            empty_client_check_error,
            processing_results,
        };

        if self.settings.send_summary_email {
            self.notifications.send_summary(&summary).await;
        }
        if self.settings.send_empty_client_warning && !summary.clients_without_timesheets.is_empty()
        {
            self.notifications
                .send_empty_client_warning(&summary.clients_without_timesheets, &period)
                .await;
        }

        tracing::info!(
            period = %period,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            clients_without_timesheets = summary.clients_without_timesheets.len(),
            "Monthly invoicing finished"
        );
        Ok(summary)
    }

    async fn clients_without_timesheets(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<Client>, AppError> {
        let (from, to) = month_bounds(year, month)
            .ok_or_else(|| AppError::Validation(vec!["month: must be between 1 and 12".into()]))?;
        self.clients
            .find_active_without_timesheets(&self.pool, from, to)
            .await
    }
}
