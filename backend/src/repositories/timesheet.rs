//! Timesheet repository.
//!
//! Every read joins `clients` so callers get the client name and the rate the
//! timesheet falls back to when it carries no snapshot.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::repositories::repository::Repository;
use crate::models::timesheet::Timesheet;
use crate::types::{ClientId, InvoiceId, TimesheetId};

const TABLE_NAME: &str = "timesheets";
const SELECT_FROM: &str = "SELECT t.id, t.client_id, c.client_name, t.service_date, t.duration, \
     t.hourly_rate, c.hourly_rate AS client_hourly_rate, t.invoiced, t.invoice_id, \
     t.payment_date, t.created_at, t.updated_at \
     FROM timesheets t JOIN clients c ON c.id = t.client_id";

/// Column values for an insert or full update.
#[derive(Debug, Clone)]
pub struct TimesheetValues {
    pub client_id: ClientId,
    pub service_date: NaiveDate,
    pub duration: rust_decimal::Decimal,
    pub hourly_rate: Option<rust_decimal::Decimal>,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimesheetRepository;

impl TimesheetRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, db: &PgPool, values: &TimesheetValues) -> Result<Timesheet, AppError> {
        let id = TimesheetId::new();
        sqlx::query(
            "INSERT INTO timesheets (id, client_id, service_date, duration, hourly_rate, payment_date) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(values.client_id)
        .bind(values.service_date)
        .bind(values.duration)
        .bind(values.hourly_rate)
        .bind(values.payment_date)
        .execute(db)
        .await?;
        self.find_by_id(db, id).await
    }

    pub async fn update(
        &self,
        db: &PgPool,
        id: TimesheetId,
        values: &TimesheetValues,
    ) -> Result<Timesheet, AppError> {
        let result = sqlx::query(
            "UPDATE timesheets SET client_id = $2, service_date = $3, duration = $4, \
             hourly_rate = $5, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(values.client_id)
        .bind(values.service_date)
        .bind(values.duration)
        .bind(values.hourly_rate)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Timesheet not found".into()));
        }
        self.find_by_id(db, id).await
    }

    pub async fn delete(&self, db: &PgPool, id: TimesheetId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM timesheets WHERE id = $1 AND NOT invoiced")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::BusinessRule(
                "Timesheet is invoiced or no longer exists".into(),
            ));
        }
        Ok(())
    }

    pub async fn find_by_client(
        &self,
        db: &PgPool,
        client_id: ClientId,
        invoiced: Option<bool>,
    ) -> Result<Vec<Timesheet>, AppError> {
        let query = format!(
            "{} WHERE t.client_id = $1 AND ($2::BOOLEAN IS NULL OR t.invoiced = $2) \
             ORDER BY t.service_date DESC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Timesheet>(&query)
            .bind(client_id)
            .bind(invoiced)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_client_between(
        &self,
        db: &PgPool,
        client_id: ClientId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Timesheet>, AppError> {
        let query = format!(
            "{} WHERE t.client_id = $1 AND t.service_date BETWEEN $2 AND $3 \
             ORDER BY t.service_date ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Timesheet>(&query)
            .bind(client_id)
            .bind(from)
            .bind(to)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_unbilled(&self, db: &PgPool) -> Result<Vec<Timesheet>, AppError> {
        let query = format!(
            "{} WHERE NOT t.invoiced ORDER BY c.client_name ASC, t.service_date ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Timesheet>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn find_unbilled_between(
        &self,
        db: &PgPool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Timesheet>, AppError> {
        let query = format!(
            "{} WHERE NOT t.invoiced AND t.service_date BETWEEN $1 AND $2 \
             ORDER BY c.client_name ASC, t.client_id, t.service_date ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Timesheet>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_ids(
        &self,
        conn: &mut PgConnection,
        ids: &[TimesheetId],
    ) -> Result<Vec<Timesheet>, AppError> {
        let query = format!(
            "{} WHERE t.id = ANY($1) ORDER BY t.service_date ASC, t.created_at ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Timesheet>(&query)
            .bind(ids.iter().map(|id| *id.as_uuid()).collect::<Vec<_>>())
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Marks `ids` invoiced against `invoice_id`, but only rows that are still
    /// uninvoiced. Returns how many rows were claimed.
    pub async fn attach_to_invoice(
        &self,
        conn: &mut PgConnection,
        ids: &[TimesheetId],
        invoice_id: InvoiceId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE timesheets SET invoiced = TRUE, invoice_id = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND invoiced = FALSE",
        )
        .bind(ids.iter().map(|id| *id.as_uuid()).collect::<Vec<_>>())
        .bind(invoice_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn detach(
        &self,
        conn: &mut PgConnection,
        ids: &[TimesheetId],
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE timesheets SET invoiced = FALSE, invoice_id = NULL, updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(ids.iter().map(|id| *id.as_uuid()).collect::<Vec<_>>())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn detach_all_from_invoice(
        &self,
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE timesheets SET invoiced = FALSE, invoice_id = NULL, updated_at = NOW() \
             WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all_for_invoice(
        &self,
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
    ) -> Result<u64, AppError> {
        // Item rows reference timesheets; clear the link before deleting.
        sqlx::query(
            "UPDATE invoice_items SET timesheet_id = NULL WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .execute(&mut *conn)
        .await?;
        let result = sqlx::query("DELETE FROM timesheets WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_paid(
        &self,
        db: &PgPool,
        id: TimesheetId,
        payment_date: NaiveDate,
    ) -> Result<Timesheet, AppError> {
        let result = sqlx::query(
            "UPDATE timesheets SET payment_date = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_date)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Timesheet not found".into()));
        }
        self.find_by_id(db, id).await
    }

    pub async fn count_for_invoice(
        &self,
        db: &PgPool,
        invoice_id: InvoiceId,
    ) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM timesheets WHERE invoice_id = $1")
                .bind(invoice_id)
                .fetch_one(db)
                .await?;
        Ok(count)
    }
}

impl Repository<Timesheet> for TimesheetRepository {
    const TABLE: &'static str = TABLE_NAME;
    type Id = TimesheetId;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<Timesheet>, AppError> {
        let query = format!("{} ORDER BY t.service_date DESC, c.client_name ASC", SELECT_FROM);
        let rows = sqlx::query_as::<_, Timesheet>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    async fn find_by_id(&self, db: &PgPool, id: TimesheetId) -> Result<Timesheet, AppError> {
        self.find_optional(db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Timesheet not found".into()))
    }

    async fn find_optional(
        &self,
        db: &PgPool,
        id: TimesheetId,
    ) -> Result<Option<Timesheet>, AppError> {
        let query = format!("{} WHERE t.id = $1", SELECT_FROM);
        let row = sqlx::query_as::<_, Timesheet>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}
