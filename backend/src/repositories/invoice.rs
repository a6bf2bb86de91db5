//! Invoice and invoice item repository.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invoice::{Invoice, InvoiceItem, InvoiceItemDraft};
use crate::models::PaginationQuery;
use crate::repositories::common::push_clause;
use crate::types::{ClientId, InvoiceId, InvoiceItemId, NumberingSchemeId, SellerId};

const SELECT_FROM: &str = "SELECT i.id, i.invoice_number, i.issue_date, i.total_amount, \
     i.client_id, c.client_name, i.seller_id, i.sequence_number, i.period_year, i.period_month, \
     i.numbering_scheme_id, i.pdf_path, i.pdf_generated_at, i.email_sent_at, \
     i.email_tracking_token, i.email_opened_at, i.last_email_opened_at, i.email_open_count, \
     i.created_at, i.updated_at \
     FROM invoices i JOIN clients c ON c.id = i.client_id";
const ORDER_NEWEST: &str =
    " ORDER BY i.period_year DESC, i.period_month DESC, i.sequence_number DESC";
const ITEM_COLUMNS: &str = "id, invoice_id, position, service_date, description, duration, \
     hourly_rate, amount, timesheet_id";

/// Header values for a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub total_amount: Decimal,
    pub client_id: ClientId,
    pub seller_id: SellerId,
    pub sequence_number: i32,
    pub period_year: i32,
    pub period_month: i32,
    pub numbering_scheme_id: Option<NumberingSchemeId>,
}

/// Editable header values of an existing invoice.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceHeader<'a> {
    pub client_id: ClientId,
    pub issue_date: NaiveDate,
    pub invoice_number: &'a str,
    pub total_amount: Decimal,
    pub period_year: i32,
    pub period_month: i32,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub client_id: Option<ClientId>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        invoice: &NewInvoice,
    ) -> Result<InvoiceId, AppError> {
        let id = InvoiceId::new();
        sqlx::query(
            "INSERT INTO invoices (id, invoice_number, issue_date, total_amount, client_id, \
             seller_id, sequence_number, period_year, period_month, numbering_scheme_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(&invoice.invoice_number)
        .bind(invoice.issue_date)
        .bind(invoice.total_amount)
        .bind(invoice.client_id)
        .bind(invoice.seller_id)
        .bind(invoice.sequence_number)
        .bind(invoice.period_year)
        .bind(invoice.period_month)
        .bind(invoice.numbering_scheme_id)
        .execute(conn)
        .await?;
        Ok(id)
    }

    /// Writes items in order; `position` follows slice order starting at 1.
    pub async fn insert_items(
        &self,
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
        items: &[InvoiceItemDraft],
    ) -> Result<(), AppError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO invoice_items (id, invoice_id, position, service_date, description, \
             duration, hourly_rate, amount, timesheet_id) ",
        );
        builder.push_values(items.iter().enumerate(), |mut row, (idx, item)| {
            row.push_bind(InvoiceItemId::new())
                .push_bind(invoice_id)
                .push_bind(idx as i32 + 1)
                .push_bind(item.service_date)
                .push_bind(item.description.clone())
                .push_bind(item.duration)
                .push_bind(item.hourly_rate)
                .push_bind(item.amount)
                .push_bind(item.timesheet_id);
        });
        builder.build().execute(conn).await?;
        Ok(())
    }

    pub async fn delete_items(
        &self,
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, conn: &mut PgConnection, id: InvoiceId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Invoice not found".into()));
        }
        Ok(())
    }

    /// Rewrites header fields after an edit and clears the stale PDF.
    pub async fn update_header(
        &self,
        conn: &mut PgConnection,
        id: InvoiceId,
        header: InvoiceHeader<'_>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE invoices SET client_id = $2, issue_date = $3, invoice_number = $4, \
             total_amount = $5, period_year = $6, period_month = $7, pdf_path = NULL, \
             pdf_generated_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(header.client_id)
        .bind(header.issue_date)
        .bind(header.invoice_number)
        .bind(header.total_amount)
        .bind(header.period_year)
        .bind(header.period_month)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, db: &PgPool, id: InvoiceId) -> Result<Invoice, AppError> {
        self.find_optional(db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".into()))
    }

    pub async fn find_optional(
        &self,
        db: &PgPool,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, AppError> {
        let query = format!("{} WHERE i.id = $1", SELECT_FROM);
        let row = sqlx::query_as::<_, Invoice>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn find_by_number(&self, db: &PgPool, number: &str) -> Result<Invoice, AppError> {
        let query = format!("{} WHERE i.invoice_number = $1", SELECT_FROM);
        sqlx::query_as::<_, Invoice>(&query)
            .bind(number)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".into()))
    }

    pub async fn number_taken(
        &self,
        conn: &mut PgConnection,
        number: &str,
        except: Option<InvoiceId>,
    ) -> Result<bool, AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE invoice_number = $1 \
             AND ($2::UUID IS NULL OR id <> $2))",
        )
        .bind(number)
        .bind(except)
        .fetch_one(conn)
        .await?;
        Ok(taken)
    }

    pub async fn find_items(
        &self,
        db: &PgPool,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = $1 ORDER BY position ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceItem>(&query)
            .bind(invoice_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_items_tx(
        &self,
        conn: &mut PgConnection,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let query = format!(
            "SELECT {} FROM invoice_items WHERE invoice_id = $1 ORDER BY position ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<_, InvoiceItem>(&query)
            .bind(invoice_id)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
        let mut has_clause = false;
        if let Some(client_id) = filter.client_id {
            push_clause(builder, &mut has_clause);
            builder.push("i.client_id = ").push_bind(client_id);
        }
        if let Some(year) = filter.year {
            push_clause(builder, &mut has_clause);
            builder
                .push("EXTRACT(YEAR FROM i.issue_date)::INT = ")
                .push_bind(year);
        }
        if let Some(month) = filter.month {
            push_clause(builder, &mut has_clause);
            builder
                .push("EXTRACT(MONTH FROM i.issue_date)::INT = ")
                .push_bind(month as i32);
        }
    }

    pub async fn list(
        &self,
        db: &PgPool,
        filter: &InvoiceFilter,
        page: &PaginationQuery,
    ) -> Result<(Vec<Invoice>, i64), AppError> {
        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM invoices i");
        Self::push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(db)
            .await?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(SELECT_FROM);
        Self::push_filters(&mut builder, filter);
        builder
            .push(ORDER_NEWEST)
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = builder
            .build_query_as::<Invoice>()
            .fetch_all(db)
            .await?;
        Ok((rows, total))
    }

    pub async fn find_by_client_between(
        &self,
        db: &PgPool,
        client_id: ClientId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        let query = format!(
            "{} WHERE i.client_id = $1 AND i.issue_date BETWEEN $2 AND $3 \
             ORDER BY i.issue_date ASC, i.sequence_number ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Invoice>(&query)
            .bind(client_id)
            .bind(from)
            .bind(to)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// Report rows; either bound may be open.
    pub async fn find_for_report(
        &self,
        db: &PgPool,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        client_id: Option<ClientId>,
    ) -> Result<Vec<Invoice>, AppError> {
        let query = format!(
            "{} WHERE ($1::DATE IS NULL OR i.issue_date >= $1) \
             AND ($2::DATE IS NULL OR i.issue_date <= $2) \
             AND ($3::UUID IS NULL OR i.client_id = $3) \
             ORDER BY i.issue_date ASC, i.sequence_number ASC",
            SELECT_FROM
        );
        let rows = sqlx::query_as::<_, Invoice>(&query)
            .bind(from)
            .bind(to)
            .bind(client_id)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn max_sequence(
        &self,
        conn: &mut PgConnection,
        seller_id: SellerId,
        period_year: i32,
        period_month: i32,
    ) -> Result<i32, AppError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(sequence_number) FROM invoices \
             WHERE seller_id = $1 AND period_year = $2 AND period_month = $3",
        )
        .bind(seller_id)
        .bind(period_year)
        .bind(period_month)
        .fetch_one(conn)
        .await?;
        Ok(max.unwrap_or(0))
    }

    pub async fn set_pdf(
        &self,
        db: &PgPool,
        id: InvoiceId,
        path: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE invoices SET pdf_path = $2, pdf_generated_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(path)
        .bind(generated_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_tracking_token(
        &self,
        db: &PgPool,
        id: InvoiceId,
        token: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE invoices SET email_tracking_token = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn mark_email_sent(
        &self,
        db: &PgPool,
        id: InvoiceId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE invoices SET email_sent_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(sent_at)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Copies the tracking counters onto the invoice row.
    pub async fn mirror_open(
        &self,
        conn: &mut PgConnection,
        id: InvoiceId,
        opened_at: Option<DateTime<Utc>>,
        last_opened_at: Option<DateTime<Utc>>,
        open_count: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE invoices SET email_opened_at = $2, last_email_opened_at = $3, \
             email_open_count = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(opened_at)
        .bind(last_opened_at)
        .bind(open_count)
        .execute(conn)
        .await?;
        Ok(())
    }
}
