//! Transaction helpers mapping driver errors into `AppError`.

use crate::error::AppError;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'_>, AppError> {
    db.begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

pub async fn commit_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

/// Explicit rollback; dropping an uncommitted transaction also rolls it back.
pub async fn rollback_transaction(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.rollback()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}
