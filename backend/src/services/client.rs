use sqlx::PgPool;
use validator::Validate;

use crate::error::AppError;
use crate::models::client::{Client, ClientRequest};
use crate::repositories::{ClientRepository, Repository};
use crate::types::ClientId;

#[derive(Clone)]
pub struct ClientService {
    pool: PgPool,
    repo: ClientRepository,
}

impl ClientService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            repo: ClientRepository::new(),
        }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Client>, AppError> {
        self.repo.list(&self.pool, include_inactive).await
    }

    pub async fn get(&self, id: ClientId) -> Result<Client, AppError> {
        self.repo.find_by_id(&self.pool, id).await
    }

    pub async fn search(&self, name: &str) -> Result<Vec<Client>, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Search name must not be empty".into()));
        }
        self.repo.search_by_name(&self.pool, name).await
    }

    pub async fn create(&self, req: ClientRequest) -> Result<Client, AppError> {
        req.validate()?;
        let client = self.repo.create(&self.pool, &req).await?;
        tracing::info!(client_id = %client.id, name = %client.name, "Client created");
        Ok(client)
    }

    pub async fn update(&self, id: ClientId, req: ClientRequest) -> Result<Client, AppError> {
        req.validate()?;
        self.repo.update(&self.pool, id, &req).await
    }

    /// Clients are never hard-deleted; their invoices must stay readable.
    pub async fn deactivate(&self, id: ClientId) -> Result<(), AppError> {
        self.repo.set_active(&self.pool, id, false).await?;
        tracing::info!(client_id = %id, "Client deactivated");
        Ok(())
    }
}
