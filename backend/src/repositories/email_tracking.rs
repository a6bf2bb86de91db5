//! Email tracking persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::email_tracking::{EmailTracking, TrackingStats};
use crate::types::{InvoiceId, TrackingId};

const SELECT_COLUMNS: &str = "id, invoice_id, tracking_token, opened_at, last_opened_at, \
     open_count, ip_address, user_agent, device_type, email_client, expires_at, created_at";

/// Fields written on every pixel hit.
#[derive(Debug, Clone)]
pub struct OpenUpdate<'a> {
    pub at: DateTime<Utc>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub device_type: &'a str,
    pub email_client: &'a str,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmailTrackingRepository;

impl EmailTrackingRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert(
        &self,
        db: &PgPool,
        invoice_id: InvoiceId,
        token: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailTracking, AppError> {
        let query = format!(
            "INSERT INTO email_tracking (id, invoice_id, tracking_token, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, EmailTracking>(&query)
            .bind(TrackingId::new())
            .bind(invoice_id)
            .bind(token)
            .bind(expires_at)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    /// Row lock held until the surrounding transaction ends, so concurrent
    /// hits on one token serialise their counter updates.
    pub async fn find_by_token_for_update(
        &self,
        conn: &mut PgConnection,
        token: Uuid,
    ) -> Result<Option<EmailTracking>, AppError> {
        let query = format!(
            "SELECT {} FROM email_tracking WHERE tracking_token = $1 FOR UPDATE",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, EmailTracking>(&query)
            .bind(token)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn find_by_invoice(
        &self,
        db: &PgPool,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EmailTracking>, AppError> {
        let query = format!(
            "SELECT {} FROM email_tracking WHERE invoice_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, EmailTracking>(&query)
            .bind(invoice_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// Increments the counter; `opened_at` is only written on the first open.
    pub async fn record_open(
        &self,
        conn: &mut PgConnection,
        id: TrackingId,
        update: &OpenUpdate<'_>,
    ) -> Result<EmailTracking, AppError> {
        let query = format!(
            "UPDATE email_tracking SET open_count = open_count + 1, \
             opened_at = COALESCE(opened_at, $2), last_opened_at = $2, \
             ip_address = $3, user_agent = $4, device_type = $5, email_client = $6 \
             WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, EmailTracking>(&query)
            .bind(id)
            .bind(update.at)
            .bind(update.ip_address)
            .bind(update.user_agent)
            .bind(update.device_type)
            .bind(update.email_client)
            .fetch_one(conn)
            .await?;
        Ok(row)
    }

    pub async fn stats(&self, db: &PgPool, now: DateTime<Utc>) -> Result<TrackingStats, AppError> {
        let (total, opened, last_24h, last_7d, avg_hours): (i64, i64, i64, i64, Option<f64>) =
            sqlx::query_as(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE opened_at IS NOT NULL), \
                 COUNT(*) FILTER (WHERE opened_at >= $1 - INTERVAL '24 hours'), \
                 COUNT(*) FILTER (WHERE opened_at >= $1 - INTERVAL '7 days'), \
                 (AVG(EXTRACT(EPOCH FROM (opened_at - created_at))) \
                     FILTER (WHERE opened_at IS NOT NULL) / 3600.0)::FLOAT8 \
                 FROM email_tracking",
            )
            .bind(now)
            .fetch_one(db)
            .await?;

        let open_rate = if total == 0 {
            0.0
        } else {
            (opened as f64 / total as f64) * 100.0
        };
        Ok(TrackingStats {
            total_tracked: total,
            opened,
            open_rate,
            opened_last_24h: last_24h,
            opened_last_7days: last_7d,
            average_hours_to_first_open: avg_hours,
        })
    }

    pub async fn delete_created_before(
        &self,
        db: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM email_tracking WHERE created_at < $1")
            .bind(cutoff)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
