//! Invoice email open tracking.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use chrono::{Duration, Months, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::error::AppError;
use crate::models::email_tracking::{EmailTracking, OpenContext, RecordedOpen, TrackingStats};
use crate::repositories::email_tracking::OpenUpdate;
use crate::repositories::{
    begin_transaction, commit_transaction, EmailTrackingRepository, InvoiceRepository,
};
use crate::types::InvoiceId;

/// 1x1 transparent PNG served for every pixel request.
pub const TRANSPARENT_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const RETENTION_MONTHS: u32 = 12;

pub fn classify_device(user_agent: Option<&str>) -> &'static str {
    let Some(ua) = user_agent else {
        return "Unknown";
    };
    let ua = ua.to_lowercase();
    if ["mobile", "android", "iphone", "ipod"]
        .iter()
        .any(|needle| ua.contains(needle))
    {
        "Mobile"
    } else if ua.contains("tablet") || ua.contains("ipad") {
        "Tablet"
    } else {
        "Desktop"
    }
}

/// First matching rule wins.
const CLIENT_RULES: &[(&[&str], &str)] = &[
    (&["gmail", "google"], "Gmail"),
    (&["outlook"], "Outlook"),
    (&["applemail", "apple mail"], "Apple Mail"),
    (&["thunderbird"], "Thunderbird"),
    (&["yahoo"], "Yahoo Mail"),
    (&["proton"], "ProtonMail"),
    (&["mail"], "Mail App"),
    (&["chrome"], "Browser (Chrome)"),
    (&["firefox"], "Browser (Firefox)"),
    (&["safari"], "Browser (Safari)"),
    (&["edge"], "Browser (Edge)"),
];

pub fn classify_client(user_agent: Option<&str>) -> &'static str {
    let Some(ua) = user_agent else {
        return "Unknown";
    };
    let ua = ua.to_lowercase();
    CLIENT_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| ua.contains(needle)))
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}

fn usable_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("unknown"))
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = usable_header(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real_ip) = usable_header(headers, "x-real-ip") {
        return Some(real_ip.to_string());
    }
    peer.map(|addr| addr.ip().to_string())
}

#[derive(Clone)]
pub struct EmailTrackingService {
    pool: PgPool,
    repo: EmailTrackingRepository,
    invoices: InvoiceRepository,
    token_expiry_days: i64,
}

impl EmailTrackingService {
    pub fn new(pool: PgPool, config: &TrackingConfig) -> Self {
        Self {
            pool,
            repo: EmailTrackingRepository::new(),
            invoices: InvoiceRepository::new(),
            token_expiry_days: config.token_expiry_days,
        }
    }

    pub async fn create_tracking(&self, invoice_id: InvoiceId) -> Result<EmailTracking, AppError> {
        let token = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::days(self.token_expiry_days);
        let tracking = self
            .repo
            .insert(&self.pool, invoice_id, token, expires_at)
            .await?;
        self.invoices
            .set_tracking_token(&self.pool, invoice_id, token)
            .await?;
        tracing::debug!(invoice_id = %invoice_id, expires_at = %expires_at, "Tracking token issued");
        Ok(tracking)
    }

    /// Records a pixel hit. Unknown, malformed and expired tokens record
    /// nothing and return `None`.
    pub async fn record_open(
        &self,
        token: &str,
        context: &OpenContext,
    ) -> Result<Option<RecordedOpen>, AppError> {
        let Ok(token) = Uuid::parse_str(token.trim()) else {
            tracing::debug!("Ignoring malformed tracking token");
            return Ok(None);
        };
        let now = Utc::now();

        let mut tx = begin_transaction(&self.pool).await?;
        let Some(existing) = self.repo.find_by_token_for_update(&mut tx, token).await? else {
            tracing::debug!(token = %token, "Ignoring unknown tracking token");
            return Ok(None);
        };
        if existing.is_expired(now) {
            tracing::debug!(token = %token, "Ignoring expired tracking token");
            return Ok(None);
        }

        let user_agent = context.user_agent.as_deref();
        let update = OpenUpdate {
            at: now,
            ip_address: context.ip_address.as_deref(),
            user_agent,
            device_type: classify_device(user_agent),
            email_client: classify_client(user_agent),
        };
        let tracking = self.repo.record_open(&mut tx, existing.id, &update).await?;
        self.invoices
            .mirror_open(
                &mut tx,
                tracking.invoice_id,
                tracking.opened_at,
                tracking.last_opened_at,
                tracking.open_count,
            )
            .await?;
        commit_transaction(tx).await?;

        let invoice = self.invoices.find_by_id(&self.pool, tracking.invoice_id).await?;
        let first_open = existing.opened_at.is_none();
        tracing::info!(
            invoice_number = %invoice.invoice_number,
            open_count = tracking.open_count,
            first_open,
            device = update.device_type,
            client = update.email_client,
            "Invoice email opened"
        );
        Ok(Some(RecordedOpen {
            tracking,
            invoice_number: invoice.invoice_number,
            client_name: invoice.client_name,
            first_open,
        }))
    }

    pub async fn find_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EmailTracking>, AppError> {
        self.repo.find_by_invoice(&self.pool, invoice_id).await
    }

    pub async fn stats(&self) -> Result<TrackingStats, AppError> {
        self.repo.stats(&self.pool, Utc::now()).await
    }

    /// Deletes tracking rows created more than twelve months ago.
    pub async fn cleanup_old_records(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let cutoff = now
            .checked_sub_months(Months::new(RETENTION_MONTHS))
            .unwrap_or(now);
        let deleted = self.repo.delete_created_before(&self.pool, cutoff).await?;
        tracing::info!(deleted, cutoff = %cutoff, "Old tracking records removed");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn pixel_is_a_png() {
        assert_eq!(&TRANSPARENT_PNG[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(&TRANSPARENT_PNG[TRANSPARENT_PNG.len() - 8..TRANSPARENT_PNG.len() - 4], b"IEND");
    }

    #[test]
    fn device_classification() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(classify_device(Some(iphone)), "Mobile");
        assert_eq!(classify_device(Some("Mozilla/5.0 (iPad; CPU OS 17_0)")), "Tablet");
        assert_eq!(classify_device(Some("Mozilla/5.0 (Windows NT 10.0)")), "Desktop");
        assert_eq!(classify_device(None), "Unknown");
    }

    #[test]
    fn client_classification_respects_rule_order() {
        assert_eq!(
            classify_client(Some("Mozilla/5.0 (Windows NT 5.1; rv:11.0) Gecko Firefox/11.0 (via ggpht.com GoogleImageProxy)")),
            "Gmail"
        );
        assert_eq!(classify_client(Some("Microsoft Outlook 16.0")), "Outlook");
        assert_eq!(classify_client(Some("AppleMail/16.0")), "Apple Mail");
        assert_eq!(classify_client(Some("Thunderbird/115.0")), "Thunderbird");
        assert_eq!(classify_client(Some("YahooMailProxy")), "Yahoo Mail");
        assert_eq!(classify_client(Some("ProtonMail image loader")), "ProtonMail");
        // "mail" precedes the browser fallbacks
        assert_eq!(classify_client(Some("SomeMail/1.0 Chrome/120")), "Mail App");
        assert_eq!(classify_client(Some("Mozilla/5.0 Chrome/120 Safari/537")), "Browser (Chrome)");
        assert_eq!(classify_client(Some("Mozilla/5.0 Firefox/121")), "Browser (Firefox)");
        assert_eq!(classify_client(Some("Mozilla/5.0 Version/17 Safari/605")), "Browser (Safari)");
        assert_eq!(classify_client(Some("Mozilla/5.0 Edge/18")), "Browser (Edge)");
        assert_eq!(classify_client(Some("curl/8.0")), "Unknown");
        assert_eq!(classify_client(None), "Unknown");
    }

    #[test]
    fn client_ip_prefers_forwarded_for_then_real_ip_then_peer() {
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.1"));

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(resolve_client_ip(&headers, Some(peer)).as_deref(), Some("198.51.100.4"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(resolve_client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(resolve_client_ip(&headers, Some(peer)).as_deref(), Some("198.51.100.4"));
    }
}
