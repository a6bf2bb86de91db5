//! Client repository.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::client::{Client, ClientRequest};
use crate::repositories::repository::Repository;
use crate::types::ClientId;

const TABLE_NAME: &str = "clients";
const SELECT_COLUMNS: &str = "id, client_name, hourly_rate, house_number, street_name, city, \
     post_code, email, active, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct ClientRepository;

impl ClientRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    pub async fn list(&self, db: &PgPool, include_inactive: bool) -> Result<Vec<Client>, AppError> {
        let query = format!(
            "{} WHERE ($1 OR active) ORDER BY client_name ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, Client>(&query)
            .bind(include_inactive)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn search_by_name(&self, db: &PgPool, name: &str) -> Result<Vec<Client>, AppError> {
        let query = format!(
            "{} WHERE client_name ILIKE $1 ORDER BY client_name ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, Client>(&query)
            .bind(format!("%{}%", escape_like(name)))
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn create(&self, db: &PgPool, req: &ClientRequest) -> Result<Client, AppError> {
        let query = format!(
            "INSERT INTO {} (id, client_name, hourly_rate, house_number, street_name, city, \
             post_code, email) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Client>(&query)
            .bind(ClientId::new())
            .bind(req.name.trim())
            .bind(req.hourly_rate)
            .bind(req.house_number.trim())
            .bind(req.street_name.trim())
            .bind(req.city.trim())
            .bind(req.post_code.trim().to_ascii_uppercase())
            .bind(req.email.trim())
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    pub async fn update(
        &self,
        db: &PgPool,
        id: ClientId,
        req: &ClientRequest,
    ) -> Result<Client, AppError> {
        let query = format!(
            "UPDATE {} SET client_name = $2, hourly_rate = $3, house_number = $4, \
             street_name = $5, city = $6, post_code = $7, email = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .bind(req.name.trim())
            .bind(req.hourly_rate)
            .bind(req.house_number.trim())
            .bind(req.street_name.trim())
            .bind(req.city.trim())
            .bind(req.post_code.trim().to_ascii_uppercase())
            .bind(req.email.trim())
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".into()))
    }

    pub async fn set_active(&self, db: &PgPool, id: ClientId, active: bool) -> Result<(), AppError> {
        let query = format!(
            "UPDATE {} SET active = $2, updated_at = NOW() WHERE id = $1",
            TABLE_NAME
        );
        let result = sqlx::query(&query).bind(id).bind(active).execute(db).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Client not found".into()));
        }
        Ok(())
    }

    /// Active clients with no timesheet dated inside `[from, to]`.
    pub async fn find_active_without_timesheets(
        &self,
        db: &PgPool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Client>, AppError> {
        let query = format!(
            "SELECT {cols} FROM {table} c WHERE c.active AND NOT EXISTS (\
             SELECT 1 FROM timesheets t WHERE t.client_id = c.id \
             AND t.service_date BETWEEN $1 AND $2) ORDER BY c.client_name ASC",
            cols = prefixed_columns("c"),
            table = TABLE_NAME
        );
        let rows = sqlx::query_as::<_, Client>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn current_rate(&self, db: &PgPool, id: ClientId) -> Result<Decimal, AppError> {
        let rate: Option<Decimal> =
            sqlx::query_scalar("SELECT hourly_rate FROM clients WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        rate.ok_or_else(|| AppError::NotFound("Client not found".into()))
    }
}

fn prefixed_columns(alias: &str) -> String {
    SELECT_COLUMNS
        .split(',')
        .map(|col| format!("{}.{}", alias, col.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escapes `%` and `_` so user input is matched literally inside ILIKE.
pub(crate) fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl Repository<Client> for ClientRepository {
    const TABLE: &'static str = TABLE_NAME;
    type Id = ClientId;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<Client>, AppError> {
        self.list(db, true).await
    }

    async fn find_by_id(&self, db: &PgPool, id: ClientId) -> Result<Client, AppError> {
        self.find_optional(db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".into()))
    }

    async fn find_optional(&self, db: &PgPool, id: ClientId) -> Result<Option<Client>, AppError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_columns_qualifies_every_column() {
        let cols = prefixed_columns("c");
        assert!(cols.starts_with("c.id, c.client_name"));
        assert_eq!(cols.matches("c.").count(), SELECT_COLUMNS.split(',').count());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
