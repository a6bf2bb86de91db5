//! Renders, stores and emails invoice documents.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::models::invoice::Invoice;
use crate::repositories::{ClientRepository, InvoiceRepository, Repository, SellerRepository};
use crate::services::email_tracking::EmailTrackingService;
use crate::services::pdf::{render_invoice_pdf, InvoiceDocument};
use crate::services::storage::DocumentStorage;
use crate::types::InvoiceId;
use crate::utils::email::{escape_html, EmailAttachment, Mailer, OutgoingEmail};
use crate::utils::money::format_gbp;
use crate::utils::time::month_name;

pub fn invoice_subject(invoice_number: &str) -> String {
    format!("Invoice {}", invoice_number)
}

pub fn visits_label(count: usize) -> String {
    if count == 1 {
        "1 visit".to_string()
    } else {
        format!("{} visits", count)
    }
}

pub fn tracking_pixel(base_url: &str, token: &str) -> String {
    format!(
        "<img src=\"{}/api/track/{}.png\" width=\"1\" height=\"1\" alt=\"\" \
         style=\"display:none;width:1px;height:1px;\" />",
        base_url.trim_end_matches('/'),
        token
    )
}

/// Values interpolated into the invoice email.
pub struct InvoiceEmailContent<'a> {
    pub first_name: &'a str,
    pub invoice_number: &'a str,
    pub month: u32,
    pub visits: usize,
    pub total: Decimal,
    pub seller_name: &'a str,
    pub pixel: Option<String>,
}

pub fn invoice_email_body(content: &InvoiceEmailContent<'_>) -> String {
    format!(
        "<html><head><meta charset=\"UTF-8\"></head>\
         <body style=\"font-family:Arial,sans-serif;color:#333;\">\
         <p>Dear {first_name},</p>\
         <p>Please find attached invoice <strong>{number}</strong> for {month} \
         covering {visits}.</p>\
         <p>Total due: <strong>{total}</strong></p>\
         <p>Thank you for your business.</p>\
         <p>Kind regards,<br>{seller}</p>\
         {pixel}</body></html>",
        first_name = escape_html(content.first_name),
        number = escape_html(content.invoice_number),
        month = month_name(content.month),
        visits = visits_label(content.visits),
        total = format_gbp(content.total),
        seller = escape_html(content.seller_name),
        pixel = content.pixel.as_deref().unwrap_or(""),
    )
}

#[derive(Clone)]
pub struct InvoiceDocumentService {
    pool: PgPool,
    storage: DocumentStorage,
    mailer: Arc<dyn Mailer>,
    tracking: EmailTrackingService,
    invoices: InvoiceRepository,
    clients: ClientRepository,
    sellers: SellerRepository,
    base_url: String,
    invoice_cc: Option<String>,
    tracking_enabled: bool,
}

impl InvoiceDocumentService {
    pub fn new(
        pool: PgPool,
        config: &Config,
        storage: DocumentStorage,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            tracking: EmailTrackingService::new(pool.clone(), &config.tracking),
            pool,
            storage,
            mailer,
            invoices: InvoiceRepository::new(),
            clients: ClientRepository::new(),
            sellers: SellerRepository::new(),
            base_url: config.base_url.clone(),
            invoice_cc: config.smtp.invoice_cc.clone(),
            tracking_enabled: config.tracking.enabled,
        }
    }

    /// Renders and stores the PDF, then emails it to the client.
    pub async fn save_pdf_and_send(&self, invoice_id: InvoiceId) -> Result<Invoice, AppError> {
        let invoice = self.invoices.find_by_id(&self.pool, invoice_id).await?;
        let items = self.invoices.find_items(&self.pool, invoice_id).await?;
        let client = self.clients.find_by_id(&self.pool, invoice.client_id).await?;
        let seller = self.sellers.find_by_id(&self.pool, invoice.seller_id).await?;

        let pdf = render_invoice_pdf(&InvoiceDocument {
            invoice: &invoice,
            items: &items,
            client: &client,
            seller: &seller,
        })
        .map_err(|err| AppError::Integration(format!("Failed to render invoice PDF: {:#}", err)))?;

        let file_stem = invoice.file_stem();
        let path = self.storage.save_invoice_pdf(&file_stem, &pdf).await?;
        self.invoices
            .set_pdf(&self.pool, invoice_id, &path, Utc::now())
            .await?;

        let pixel = if self.tracking_enabled {
            let tracking = self.tracking.create_tracking(invoice_id).await?;
            Some(tracking_pixel(
                &self.base_url,
                &tracking.tracking_token.to_string(),
            ))
        } else {
            None
        };

        let body = invoice_email_body(&InvoiceEmailContent {
            first_name: client.first_name(),
            invoice_number: &invoice.invoice_number,
            month: invoice.issue_date.month(),
            visits: items.len(),
            total: invoice.total_amount,
            seller_name: &seller.name,
            pixel,
        });
        let mut email = OutgoingEmail::html(
            client.email.clone(),
            invoice_subject(&invoice.invoice_number),
            body,
        );
        email.cc = self.invoice_cc.clone();
        email.attachment = Some(EmailAttachment {
            filename: format!("{}.pdf", file_stem),
            content_type: "application/pdf".into(),
            bytes: pdf,
        });
        self.mailer.send(email).await.map_err(|err| {
            AppError::Integration(format!(
                "Failed to email invoice {}: {:#}",
                invoice.invoice_number, err
            ))
        })?;

        self.invoices
            .mark_email_sent(&self.pool, invoice_id, Utc::now())
            .await?;
        tracing::info!(
            invoice_id = %invoice_id,
            invoice_number = %invoice.invoice_number,
            to = %client.email,
            "Invoice emailed"
        );
        self.invoices.find_by_id(&self.pool, invoice_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn visit_counts_pluralise() {
        assert_eq!(visits_label(1), "1 visit");
        assert_eq!(visits_label(0), "0 visits");
        assert_eq!(visits_label(4), "4 visits");
    }

    #[test]
    fn email_body_carries_greeting_total_and_pixel() {
        let token = "5f0c7a0e-0000-4000-8000-000000000001";
        let body = invoice_email_body(&InvoiceEmailContent {
            first_name: "Jane",
            invoice_number: "001-01-2026",
            month: 1,
            visits: 4,
            total: Decimal::from_str("1234.5").unwrap(),
            seller_name: "Sparkle <Cleaning>",
            pixel: Some(tracking_pixel("https://app.example.com/", token)),
        });
        assert!(body.contains("Dear Jane,"));
        assert!(body.contains("January"));
        assert!(body.contains("4 visits"));
        assert!(body.contains("£1,234.50"));
        assert!(body.contains("Sparkle &lt;Cleaning&gt;"));
        assert!(body.contains(&format!(
            "<img src=\"https://app.example.com/api/track/{}.png\"",
            token
        )));
    }

    #[test]
    fn subject_uses_invoice_number() {
        assert_eq!(invoice_subject("INV/26/1"), "Invoice INV/26/1");
    }
}
