//! Read-side contract shared by the entity repositories.

use crate::error::AppError;
use sqlx::PgPool;

/// Lookup operations every entity repository offers.
///
/// Writes differ per entity (soft deletes, transactional attach) and live on
/// the concrete repository types.
#[allow(async_fn_in_trait)]
pub trait Repository<T> {
    /// Target table name.
    const TABLE: &'static str;
    /// Primary key type for the record.
    type Id;

    async fn find_all(&self, db: &PgPool) -> Result<Vec<T>, AppError>;

    /// Fails with `NotFound` when the row is missing.
    async fn find_by_id(&self, db: &PgPool, id: Self::Id) -> Result<T, AppError>;

    async fn find_optional(&self, db: &PgPool, id: Self::Id) -> Result<Option<T>, AppError>;
}
