use sqlx::PgPool;
use validator::Validate;

use crate::error::AppError;
use crate::models::seller::{Seller, SellerRequest};
use crate::repositories::{
    begin_transaction, commit_transaction, Repository, SellerRepository,
};
use crate::types::SellerId;

#[derive(Clone)]
pub struct SellerService {
    pool: PgPool,
    repo: SellerRepository,
}

impl SellerService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            repo: SellerRepository::new(),
        }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Seller>, AppError> {
        self.repo.list(&self.pool, include_inactive).await
    }

    pub async fn get(&self, id: SellerId) -> Result<Seller, AppError> {
        self.repo.find_by_id(&self.pool, id).await
    }

    pub async fn search(&self, name: &str) -> Result<Vec<Seller>, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Search name must not be empty".into()));
        }
        self.repo.search_by_name(&self.pool, name).await
    }

    /// Seller used when nothing else is specified.
    pub async fn billing_seller(&self) -> Result<Seller, AppError> {
        self.repo
            .find_billing_seller(&self.pool)
            .await?
            .ok_or_else(|| AppError::BusinessRule("No active seller found".into()))
    }

    pub async fn create(&self, req: SellerRequest) -> Result<Seller, AppError> {
        req.validate()?;
        let mut tx = begin_transaction(&self.pool).await?;
        if req.is_system_default {
            self.repo.clear_system_default(&mut tx).await?;
        }
        let seller = self.repo.insert(&mut tx, &req).await?;
        commit_transaction(tx).await?;
        tracing::info!(seller_id = %seller.id, default = seller.is_system_default, "Seller created");
        Ok(seller)
    }

    /// Setting `is_system_default` moves the flag off whichever seller held it.
    pub async fn update(&self, id: SellerId, req: SellerRequest) -> Result<Seller, AppError> {
        req.validate()?;
        let existing = self.repo.find_by_id(&self.pool, id).await?;
        if req.is_system_default && !existing.active {
            return Err(AppError::BusinessRule(
                "An inactive seller cannot be the system default".into(),
            ));
        }
        let mut tx = begin_transaction(&self.pool).await?;
        if req.is_system_default && !existing.is_system_default {
            self.repo.clear_system_default(&mut tx).await?;
        }
        let seller = self.repo.update(&mut tx, id, &req).await?;
        commit_transaction(tx).await?;
        Ok(seller)
    }

    pub async fn deactivate(&self, id: SellerId) -> Result<(), AppError> {
        self.repo.deactivate(&self.pool, id).await?;
        tracing::info!(seller_id = %id, "Seller deactivated");
        Ok(())
    }
}
