//! Operator emails for scheduler runs and tracked invoice opens.
//!
//! Every send swallows its own failure after logging it: a notification must
//! never mask the error or result it reports on.

use std::sync::Arc;

use chrono::Utc;

use crate::models::client::Client;
use crate::models::email_tracking::RecordedOpen;
use crate::models::invoicing::InvoicingSummary;
use crate::utils::email::{escape_html, Mailer, OutgoingEmail};
use crate::utils::money::format_gbp;

pub fn error_subject(subject: &str) -> String {
    format!("[SCHEDULER ERROR] {}", subject)
}

pub fn summary_subject(summary: &InvoicingSummary) -> String {
    format!(
        "[SCHEDULER] Monthly Invoicing - {}% Success ({}/{})",
        summary.success_rate(),
        summary.successful,
        summary.total
    )
}

pub fn empty_clients_subject(period: &str) -> String {
    format!("[SCHEDULER] Clients without timesheets - {}", period)
}

pub fn open_subject(open: &RecordedOpen) -> String {
    if open.first_open {
        format!(
            "Invoice Email Opened: {} - {}",
            open.invoice_number, open.client_name
        )
    } else {
        format!(
            "Invoice Email Re-opened: {} - {} (open #{})",
            open.invoice_number, open.client_name, open.tracking.open_count
        )
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

#[derive(Clone)]
pub struct AdminNotificationService {
    mailer: Arc<dyn Mailer>,
    admin_email: String,
    tracking_email: String,
}

impl AdminNotificationService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        admin_email: impl Into<String>,
        tracking_email: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            admin_email: admin_email.into(),
            tracking_email: tracking_email.into(),
        }
    }

    async fn deliver(&self, email: OutgoingEmail) {
        let subject = email.subject.clone();
        if let Err(err) = self.mailer.send(email).await {
            tracing::error!(subject = %subject, error = %format!("{:#}", err), "Admin notification failed");
        }
    }

    pub async fn send_error_notification(
        &self,
        subject: &str,
        details: &str,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) {
        let chain = error_chain(error)
            .iter()
            .map(|line| format!("<li>{}</li>", escape_html(line)))
            .collect::<String>();
        let body = format!(
            "<h2>Scheduler error</h2>\
             <p><strong>Time:</strong> {}</p>\
             <p><strong>Error:</strong> {}</p>\
             <p><strong>Context:</strong> {}</p>\
             <h3>Error chain</h3><ol>{}</ol>",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            escape_html(&error.to_string()),
            escape_html(details),
            chain
        );
        self.deliver(OutgoingEmail::html(&self.admin_email, error_subject(subject), body))
            .await;
    }

    pub async fn send_summary(&self, summary: &InvoicingSummary) {
        let rows = summary
            .processing_results
            .iter()
            .map(|result| {
                let (number, amount) = match &result.invoice {
                    Some(invoice) => (
                        escape_html(&invoice.invoice_number),
                        format_gbp(invoice.total_amount),
                    ),
                    None => ("not created".to_string(), "-".to_string()),
                };
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    number,
                    escape_html(&result.client_name),
                    amount,
                    if result.success { "OK" } else { "FAILED" },
                    escape_html(result.error_message.as_deref().unwrap_or(""))
                )
            })
            .collect::<String>();
        let empty_clients = match &summary.empty_client_check_error {
            Some(err) => format!("check failed ({})", escape_html(err)),
            None => summary.clients_without_timesheets.len().to_string(),
        };
        let body = format!(
            "<h2>Monthly invoicing for {}</h2>\
             <p>Run at {}</p>\
             <p>Total: {} &middot; Successful: {} &middot; Failed: {} &middot; \
             Clients without timesheets: {}</p>\
             <table border=\"1\" cellpadding=\"4\" cellspacing=\"0\">\
             <tr><th>Invoice</th><th>Client</th><th>Amount</th><th>Status</th><th>Error</th></tr>\
             {}</table>",
            escape_html(&summary.period),
            summary.execution_time.format("%Y-%m-%d %H:%M:%S UTC"),
            summary.total,
            summary.successful,
            summary.failed,
            empty_clients,
            rows
        );
        self.deliver(OutgoingEmail::html(
            &self.admin_email,
            summary_subject(summary),
            body,
        ))
        .await;
    }

    pub async fn send_empty_client_warning(&self, clients: &[Client], period: &str) {
        let items = clients
            .iter()
            .map(|client| {
                format!(
                    "<li>{} ({})</li>",
                    escape_html(&client.name),
                    escape_html(&client.email)
                )
            })
            .collect::<String>();
        let body = format!(
            "<h2>Active clients without timesheets in {}</h2><ul>{}</ul>",
            escape_html(period),
            items
        );
        self.deliver(OutgoingEmail::html(
            &self.admin_email,
            empty_clients_subject(period),
            body,
        ))
        .await;
    }

    pub async fn send_open_notification(&self, open: &RecordedOpen) {
        let tracking = &open.tracking;
        let fmt_time = |at: Option<chrono::DateTime<Utc>>| {
            at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".into())
        };
        let body = format!(
            "<h2>{}</h2>\
             <p><strong>Invoice:</strong> {}<br><strong>Client:</strong> {}</p>\
             <p><strong>Opens:</strong> {}<br>\
             <strong>First opened:</strong> {}<br>\
             <strong>Last opened:</strong> {}</p>\
             <p><strong>Device:</strong> {}<br><strong>Email client:</strong> {}<br>\
             <strong>IP:</strong> {}</p>",
            if open.first_open { "Invoice email opened" } else { "Invoice email re-opened" },
            escape_html(&open.invoice_number),
            escape_html(&open.client_name),
            tracking.open_count,
            fmt_time(tracking.opened_at),
            fmt_time(tracking.last_opened_at),
            escape_html(tracking.device_type.as_deref().unwrap_or("Unknown")),
            escape_html(tracking.email_client.as_deref().unwrap_or("Unknown")),
            escape_html(tracking.ip_address.as_deref().unwrap_or("unknown")),
        );
        self.deliver(OutgoingEmail::html(
            &self.tracking_email,
            open_subject(open),
            body,
        ))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_tracking::EmailTracking;
    use crate::models::invoicing::InvoiceProcessingResult;
    use crate::types::{ClientId, InvoiceId, TrackingId};
    use crate::utils::email::MockMailer;
    use uuid::Uuid;

    fn recorded(count: i32) -> RecordedOpen {
        let now = Utc::now();
        RecordedOpen {
            tracking: EmailTracking {
                id: TrackingId::new(),
                invoice_id: InvoiceId::new(),
                tracking_token: Uuid::new_v4(),
                opened_at: Some(now),
                last_opened_at: Some(now),
                open_count: count,
                ip_address: Some("203.0.113.9".into()),
                user_agent: None,
                device_type: Some("Desktop".into()),
                email_client: Some("Gmail".into()),
                expires_at: now,
                created_at: now,
            },
            invoice_number: "001-01-2026".into(),
            client_name: "Jane Doe".into(),
            first_open: count == 1,
        }
    }

    #[test]
    fn open_subjects_distinguish_reopens() {
        assert_eq!(
            open_subject(&recorded(1)),
            "Invoice Email Opened: 001-01-2026 - Jane Doe"
        );
        assert_eq!(
            open_subject(&recorded(3)),
            "Invoice Email Re-opened: 001-01-2026 - Jane Doe (open #3)"
        );
    }

    #[test]
    fn scheduler_subjects() {
        assert_eq!(error_subject("Boom"), "[SCHEDULER ERROR] Boom");
        assert_eq!(
            empty_clients_subject("March 2026"),
            "[SCHEDULER] Clients without timesheets - March 2026"
        );
        let summary = InvoicingSummary {
            execution_time: Utc::now(),
            period_year: 2026,
            period_month: 3,
            period: "March 2026".into(),
            total: 4,
            successful: 3,
            failed: 1,
            clients_without_timesheets: vec![],
            empty_client_check_error: None,
            processing_results: vec![],
        };
        assert_eq!(
            summary_subject(&summary),
            "[SCHEDULER] Monthly Invoicing - 75% Success (3/4)"
        );
    }

    #[tokio::test]
    async fn mail_failure_is_swallowed() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("relay down")));
        let service = AdminNotificationService::new(
            Arc::new(mailer),
            "admin@example.com",
            "admin@example.com",
        );
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        service
            .send_error_notification("Invoice Processing Error: 001", "details", &err)
            .await;
    }

    #[tokio::test]
    async fn error_notification_goes_to_admin_with_prefixed_subject() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| {
                email.to == "admin@example.com"
                    && email.subject == "[SCHEDULER ERROR] CRITICAL: Scheduled invoicing task failed"
                    && email.html_body.contains("No active seller found")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service =
            AdminNotificationService::new(Arc::new(mailer), "admin@example.com", "ops@example.com");
        let err = crate::error::AppError::BusinessRule("No active seller found".into());
        service
            .send_error_notification("CRITICAL: Scheduled invoicing task failed", "run", &err)
            .await;
    }

    #[tokio::test]
    async fn summary_shows_uncreated_invoices_and_failed_empty_client_check() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| {
                email.subject == "[SCHEDULER] Monthly Invoicing - 0% Success (0/1)"
                    && email.html_body.contains("not created")
                    && email.html_body.contains("Tom Brown")
                    && email.html_body.contains("Clients without timesheets: check failed (pool timed out)")
            })
            .times(1)
            .returning(|_| Ok(()));
        let service =
            AdminNotificationService::new(Arc::new(mailer), "admin@example.com", "ops@example.com");
        let summary = InvoicingSummary {
            execution_time: Utc::now(),
            period_year: 2026,
            period_month: 2,
            period: "February 2026".into(),
            total: 1,
            successful: 0,
            failed: 1,
            clients_without_timesheets: vec![],
            empty_client_check_error: Some("pool timed out".into()),
            processing_results: vec![InvoiceProcessingResult::not_created(
                ClientId::new(),
                "Tom Brown".into(),
                "Invoice number already exists".into(),
            )],
        };
        service.send_summary(&summary).await;
    }
}
