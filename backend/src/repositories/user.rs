//! User and role repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::AppError;
use crate::models::user::User;
use crate::types::{SellerId, UserId};

const SELECT_FROM: &str = "SELECT u.id, u.username, u.password_hash, u.email, u.active, \
     u.default_seller_id, u.token_version, u.requires_password_change, \
     u.last_password_changed_at, u.last_password_reset_at, \
     COALESCE(ARRAY(SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
       WHERE ur.user_id = u.id ORDER BY r.name), ARRAY[]::TEXT[]) AS roles, \
     u.created_at, u.updated_at \
     FROM users u";

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: Option<&'a str>,
    pub default_seller_id: Option<SellerId>,
    pub requires_password_change: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_all(&self, db: &PgPool) -> Result<Vec<User>, AppError> {
        let query = format!("{} ORDER BY u.username ASC", SELECT_FROM);
        let rows = sqlx::query_as::<_, User>(&query).fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, db: &PgPool, id: UserId) -> Result<Option<User>, AppError> {
        let query = format!("{} WHERE u.id = $1", SELECT_FROM);
        let row = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn find_by_username(
        &self,
        db: &PgPool,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let query = format!("{} WHERE u.username = $1", SELECT_FROM);
        let row = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn find_by_email(&self, db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("{} WHERE LOWER(u.email) = LOWER($1)", SELECT_FROM);
        let row = sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        user: &NewUser<'_>,
    ) -> Result<UserId, AppError> {
        let id = UserId::new();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, email, default_seller_id, \
             requires_password_change) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.email)
        .bind(user.default_seller_id)
        .bind(user.requires_password_change)
        .execute(conn)
        .await?;
        Ok(id)
    }

    pub async fn update_profile(
        &self,
        db: &PgPool,
        id: UserId,
        username: &str,
        email: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    /// Replaces the role set. Unknown role names are rejected.
    pub async fn replace_roles(
        &self,
        conn: &mut PgConnection,
        id: UserId,
        roles: &[String],
    ) -> Result<(), AppError> {
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = ANY($1)")
            .bind(roles)
            .fetch_one(&mut *conn)
            .await?;
        if known as usize != roles.len() {
            return Err(AppError::BadRequest("Unknown role name".into()));
        }
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) \
             SELECT $1, id FROM roles WHERE name = ANY($2)",
        )
        .bind(id)
        .bind(roles)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Deactivating also bumps the token version so live sessions end.
    pub async fn set_active(&self, db: &PgPool, id: UserId, active: bool) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET active = $2, \
             token_version = CASE WHEN $2 THEN token_version ELSE token_version + 1 END, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    pub async fn set_default_seller(
        &self,
        db: &PgPool,
        id: UserId,
        seller_id: Option<SellerId>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET default_seller_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(seller_id)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    pub async fn delete(&self, db: &PgPool, id: UserId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    /// Self-service change: new hash, fresh token version, flag cleared.
    pub async fn update_password_after_change(
        &self,
        db: &PgPool,
        id: UserId,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, token_version = token_version + 1, \
             requires_password_change = FALSE, last_password_changed_at = $3, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(changed_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Reset via emailed token.
    pub async fn update_password_after_reset(
        &self,
        conn: &mut PgConnection,
        id: UserId,
        password_hash: &str,
        reset_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, token_version = token_version + 1, \
             requires_password_change = FALSE, last_password_reset_at = $3, \
             last_password_changed_at = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(reset_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}
