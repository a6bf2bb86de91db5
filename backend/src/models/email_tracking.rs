//! Email-open tracking records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{InvoiceId, TrackingId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EmailTracking {
    pub id: TrackingId,
    pub invoice_id: InvoiceId,
    pub tracking_token: Uuid,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub open_count: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub email_client: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EmailTracking {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Request metadata captured when the pixel is fetched.
#[derive(Debug, Clone, Default)]
pub struct OpenContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Outcome of recording a pixel hit; carries what the admin notification needs.
#[derive(Debug, Clone)]
pub struct RecordedOpen {
    pub tracking: EmailTracking,
    pub invoice_number: String,
    pub client_name: String,
    pub first_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingStats {
    pub total_tracked: i64,
    pub opened: i64,
    /// Percentage of tracked emails opened at least once.
    pub open_rate: f64,
    pub opened_last_24h: i64,
    pub opened_last_7days: i64,
    pub average_hours_to_first_open: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingHealth {
    pub status: String,
    pub tracking_enabled: bool,
}
