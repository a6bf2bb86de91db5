//! Numbering scheme and counter persistence.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::models::numbering::{
    InvoiceNumberCounter, NumberingScheme, ResetPeriod, SchemeStatus,
};
use crate::types::{NumberingSchemeId, SellerId};

const SCHEME_COLUMNS: &str =
    "id, seller_id, template, reset_period, effective_from, version, status, created_at";
const COUNTER_COLUMNS: &str = "id, seller_id, reset_period, period_key, last_value, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct NumberingRepository;

impl NumberingRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_schemes(
        &self,
        db: &PgPool,
        seller_id: Option<SellerId>,
        active_only: bool,
    ) -> Result<Vec<NumberingScheme>, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_numbering_schemes \
             WHERE ($1::UUID IS NULL OR seller_id = $1) AND (NOT $2 OR status = 'ACTIVE') \
             ORDER BY seller_id, effective_from DESC, version DESC",
            SCHEME_COLUMNS
        );
        let rows = sqlx::query_as::<_, NumberingScheme>(&query)
            .bind(seller_id)
            .bind(active_only)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_scheme(
        &self,
        db: &PgPool,
        id: NumberingSchemeId,
    ) -> Result<NumberingScheme, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_numbering_schemes WHERE id = $1",
            SCHEME_COLUMNS
        );
        sqlx::query_as::<_, NumberingScheme>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Numbering scheme not found".into()))
    }

    /// Latest ACTIVE scheme in force on `on`.
    pub async fn find_effective(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        on: NaiveDate,
    ) -> Result<Option<NumberingScheme>, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_numbering_schemes \
             WHERE seller_id = $1 AND status = 'ACTIVE' AND effective_from <= $2 \
             ORDER BY effective_from DESC, version DESC LIMIT 1",
            SCHEME_COLUMNS
        );
        let row = sqlx::query_as::<_, NumberingScheme>(&query)
            .bind(seller_id)
            .bind(on)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn next_version(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        effective_from: NaiveDate,
    ) -> Result<i32, AppError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version) FROM invoice_numbering_schemes \
             WHERE seller_id = $1 AND effective_from = $2",
        )
        .bind(seller_id)
        .bind(effective_from)
        .fetch_one(conn)
        .await?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub async fn archive_active_for_date(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        effective_from: NaiveDate,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE invoice_numbering_schemes SET status = 'ARCHIVED' \
             WHERE seller_id = $1 AND effective_from = $2 AND status = 'ACTIVE'",
        )
        .bind(seller_id)
        .bind(effective_from)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_scheme(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        template: &str,
        reset_period: ResetPeriod,
        effective_from: NaiveDate,
        version: i32,
    ) -> Result<NumberingScheme, AppError> {
        let query = format!(
            "INSERT INTO invoice_numbering_schemes \
             (id, seller_id, template, reset_period, effective_from, version, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            SCHEME_COLUMNS
        );
        let row = sqlx::query_as::<_, NumberingScheme>(&query)
            .bind(NumberingSchemeId::new())
            .bind(seller_id)
            .bind(template)
            .bind(reset_period)
            .bind(effective_from)
            .bind(version)
            .bind(SchemeStatus::Active)
            .fetch_one(conn)
            .await?;
        Ok(row)
    }

    pub async fn archive_scheme(&self, db: &PgPool, id: NumberingSchemeId) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE invoice_numbering_schemes SET status = 'ARCHIVED' WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Numbering scheme not found".into()));
        }
        Ok(())
    }

    pub async fn list_counters(
        &self,
        db: &PgPool,
        seller_id: SellerId,
    ) -> Result<Vec<InvoiceNumberCounter>, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_number_counters WHERE seller_id = $1 \
             ORDER BY period_key DESC",
            COUNTER_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceNumberCounter>(&query)
            .bind(seller_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn current_value(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        reset_period: ResetPeriod,
        period_key: &str,
    ) -> Result<Option<i32>, AppError> {
        let value: Option<i32> = sqlx::query_scalar(
            "SELECT last_value FROM invoice_number_counters \
             WHERE seller_id = $1 AND reset_period = $2 AND period_key = $3",
        )
        .bind(seller_id)
        .bind(reset_period.as_str())
        .bind(period_key)
        .fetch_optional(conn)
        .await?;
        Ok(value)
    }

    /// Raises the counter to at least `floor`, creating it if needed.
    pub async fn raise_to_at_least(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        reset_period: ResetPeriod,
        period_key: &str,
        floor: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO invoice_number_counters (id, seller_id, reset_period, period_key, last_value) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4) \
             ON CONFLICT (seller_id, reset_period, period_key) DO UPDATE \
             SET last_value = GREATEST(invoice_number_counters.last_value, EXCLUDED.last_value), \
                 updated_at = NOW()",
        )
        .bind(seller_id)
        .bind(reset_period.as_str())
        .bind(period_key)
        .bind(floor)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Atomically takes the next value.
    pub async fn increment(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        reset_period: ResetPeriod,
        period_key: &str,
    ) -> Result<i32, AppError> {
        let value: i32 = sqlx::query_scalar(
            "INSERT INTO invoice_number_counters (id, seller_id, reset_period, period_key, last_value) \
             VALUES (gen_random_uuid(), $1, $2, $3, 1) \
             ON CONFLICT (seller_id, reset_period, period_key) DO UPDATE \
             SET last_value = invoice_number_counters.last_value + 1, updated_at = NOW() \
             RETURNING last_value",
        )
        .bind(seller_id)
        .bind(reset_period.as_str())
        .bind(period_key)
        .fetch_one(conn)
        .await?;
        Ok(value)
    }
}
