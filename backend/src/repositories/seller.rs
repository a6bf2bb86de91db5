//! Seller repository.

use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::models::seller::{Seller, SellerRequest};
use crate::repositories::client::escape_like;
use crate::repositories::repository::Repository;
use crate::types::SellerId;

const TABLE_NAME: &str = "sellers";
const SELECT_COLUMNS: &str = "id, name, street, postcode, city, service_description, bank_name, \
     account_number, sort_code, email, phone, company_registration_number, legal_form, \
     vat_number, tax_id, active, is_system_default, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct SellerRepository;

impl SellerRepository {
    pub fn new() -> Self {
        Self
    }

    fn base_select_query() -> String {
        format!("SELECT {} FROM {}", SELECT_COLUMNS, TABLE_NAME)
    }

    pub async fn list(&self, db: &PgPool, include_inactive: bool) -> Result<Vec<Seller>, AppError> {
        let query = format!(
            "{} WHERE ($1 OR active) ORDER BY is_system_default DESC, name ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, Seller>(&query)
            .bind(include_inactive)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn search_by_name(&self, db: &PgPool, name: &str) -> Result<Vec<Seller>, AppError> {
        let query = format!(
            "{} WHERE name ILIKE $1 ORDER BY name ASC",
            Self::base_select_query()
        );
        let rows = sqlx::query_as::<_, Seller>(&query)
            .bind(format!("%{}%", escape_like(name)))
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// The system default if it is active, else the oldest active seller.
    pub async fn find_billing_seller(&self, db: &PgPool) -> Result<Option<Seller>, AppError> {
        let query = format!(
            "{} WHERE active ORDER BY is_system_default DESC, created_at ASC LIMIT 1",
            Self::base_select_query()
        );
        let row = sqlx::query_as::<_, Seller>(&query)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn clear_system_default(&self, conn: &mut PgConnection) -> Result<(), AppError> {
        let query = format!(
            "UPDATE {} SET is_system_default = FALSE, updated_at = NOW() WHERE is_system_default",
            TABLE_NAME
        );
        sqlx::query(&query).execute(conn).await?;
        Ok(())
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        req: &SellerRequest,
    ) -> Result<Seller, AppError> {
        let query = format!(
            "INSERT INTO {} (id, name, street, postcode, city, service_description, bank_name, \
             account_number, sort_code, email, phone, company_registration_number, legal_form, \
             vat_number, tax_id, is_system_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, Seller>(&query)
            .bind(SellerId::new())
            .bind(req.name.trim())
            .bind(req.street.trim())
            .bind(req.postcode.trim())
            .bind(req.city.trim())
            .bind(req.service_description.trim())
            .bind(&req.bank_name)
            .bind(&req.account_number)
            .bind(&req.sort_code)
            .bind(&req.email)
            .bind(&req.phone)
            .bind(&req.company_registration_number)
            .bind(&req.legal_form)
            .bind(&req.vat_number)
            .bind(&req.tax_id)
            .bind(req.is_system_default)
            .fetch_one(conn)
            .await?;
        Ok(row)
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: SellerId,
        req: &SellerRequest,
    ) -> Result<Seller, AppError> {
        let query = format!(
            "UPDATE {} SET name = $2, street = $3, postcode = $4, city = $5, \
             service_description = $6, bank_name = $7, account_number = $8, sort_code = $9, \
             email = $10, phone = $11, company_registration_number = $12, legal_form = $13, \
             vat_number = $14, tax_id = $15, is_system_default = $16, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        sqlx::query_as::<_, Seller>(&query)
            .bind(id)
            .bind(req.name.trim())
            .bind(req.street.trim())
            .bind(req.postcode.trim())
            .bind(req.city.trim())
            .bind(req.service_description.trim())
            .bind(&req.bank_name)
            .bind(&req.account_number)
            .bind(&req.sort_code)
            .bind(&req.email)
            .bind(&req.phone)
            .bind(&req.company_registration_number)
            .bind(&req.legal_form)
            .bind(&req.vat_number)
            .bind(&req.tax_id)
            .bind(req.is_system_default)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Seller not found".into()))
    }

    /// Deactivation also drops the default flag.
    pub async fn deactivate(&self, db: &PgPool, id: SellerId) -> Result<(), AppError> {
        let query = format!(
            "UPDATE {} SET active = FALSE, is_system_default = FALSE, updated_at = NOW() \
             WHERE id = $1",
            TABLE_NAME
        );
        let result = sqlx::query(&query).bind(id).execute(db).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Seller not found".into()));
        }
        Ok(())
    }
}

impl Repository<Seller> for SellerRepository {
    const TABLE: &'static str = TABLE_NAME;
    type Id = SellerId;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<Seller>, AppError> {
        self.list(db, true).await
    }

    async fn find_by_id(&self, db: &PgPool, id: SellerId) -> Result<Seller, AppError> {
        self.find_optional(db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Seller not found".into()))
    }

    async fn find_optional(&self, db: &PgPool, id: SellerId) -> Result<Option<Seller>, AppError> {
        let query = format!("{} WHERE id = $1", Self::base_select_query());
        let row = sqlx::query_as::<_, Seller>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}
