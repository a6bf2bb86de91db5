use sqlx::PgPool;
use validator::Validate;

use crate::error::AppError;
use crate::models::user::{
    CreateUserRequest, UpdateRolesRequest, UpdateUserRequest, User, UserResponse, ROLE_USER,
};
use crate::repositories::user::NewUser;
use crate::repositories::{
    begin_transaction, commit_transaction, Repository, SellerRepository, UserRepository,
};
use crate::types::{SellerId, UserId};
use crate::utils::security::hash_password;

/// Deduplicated role list; an empty request means plain user.
fn normalise_roles(roles: &[String]) -> Vec<String> {
    let mut out: Vec<String> = roles
        .iter()
        .map(|role| role.trim().to_uppercase())
        .filter(|role| !role.is_empty())
        .collect();
    out.sort();
    out.dedup();
    if out.is_empty() {
        out.push(ROLE_USER.to_string());
    }
    out
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    repo: UserRepository,
    sellers: SellerRepository,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            repo: UserRepository::new(),
            sellers: SellerRepository::new(),
        }
    }

    async fn load(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub async fn list(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = self.repo.find_all(&self.pool).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get(&self, id: UserId) -> Result<UserResponse, AppError> {
        Ok(self.load(id).await?.into())
    }

    pub async fn create(&self, req: CreateUserRequest) -> Result<UserResponse, AppError> {
        req.validate()?;
        if self
            .repo
            .find_by_username(&self.pool, req.username.trim())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already exists".into()));
        }
        if let Some(seller_id) = req.default_seller_id {
            self.sellers.find_by_id(&self.pool, seller_id).await?;
        }

        let password_hash = hash_password(&req.password)?;
        let roles = normalise_roles(&req.roles);
        let mut tx = begin_transaction(&self.pool).await?;
        let id = self
            .repo
            .insert(
                &mut tx,
                &NewUser {
                    username: req.username.trim(),
                    password_hash: &password_hash,
                    email: req.email.as_deref(),
                    default_seller_id: req.default_seller_id,
                    requires_password_change: req.requires_password_change,
                },
            )
            .await?;
        self.repo.replace_roles(&mut tx, id, &roles).await?;
        commit_transaction(tx).await?;

        tracing::info!(user_id = %id, roles = ?roles, "User created");
        self.get(id).await
    }

    pub async fn update(&self, id: UserId, req: UpdateUserRequest) -> Result<UserResponse, AppError> {
        req.validate()?;
        if let Some(other) = self
            .repo
            .find_by_username(&self.pool, req.username.trim())
            .await?
        {
            if other.id != id {
                return Err(AppError::Conflict("Username already exists".into()));
            }
        }
        self.repo
            .update_profile(&self.pool, id, req.username.trim(), req.email.as_deref())
            .await?;
        self.get(id).await
    }

    pub async fn update_roles(
        &self,
        id: UserId,
        req: UpdateRolesRequest,
    ) -> Result<UserResponse, AppError> {
        self.load(id).await?;
        let roles = normalise_roles(&req.roles);
        let mut tx = begin_transaction(&self.pool).await?;
        self.repo.replace_roles(&mut tx, id, &roles).await?;
        commit_transaction(tx).await?;
        tracing::info!(user_id = %id, roles = ?roles, "User roles replaced");
        self.get(id).await
    }

    pub async fn set_active(&self, id: UserId, active: bool) -> Result<UserResponse, AppError> {
        self.repo.set_active(&self.pool, id, active).await?;
        tracing::info!(user_id = %id, active, "User activation changed");
        self.get(id).await
    }

    pub async fn set_default_seller(
        &self,
        id: UserId,
        seller_id: Option<SellerId>,
    ) -> Result<UserResponse, AppError> {
        if let Some(seller_id) = seller_id {
            self.sellers.find_by_id(&self.pool, seller_id).await?;
        }
        self.repo.set_default_seller(&self.pool, id, seller_id).await?;
        self.get(id).await
    }

    /// Admins cannot delete their own account.
    pub async fn delete(&self, acting: &User, id: UserId) -> Result<(), AppError> {
        if acting.id == id {
            return Err(AppError::BusinessRule("You cannot delete your own account".into()));
        }
        self.repo.delete(&self.pool, id).await?;
        tracing::info!(user_id = %id, deleted_by = %acting.id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_normalised_and_defaulted() {
        assert_eq!(normalise_roles(&[]), vec![ROLE_USER.to_string()]);
        assert_eq!(
            normalise_roles(&["role_admin".into(), "ROLE_ADMIN".into(), " ".into()]),
            vec!["ROLE_ADMIN".to_string()]
        );
    }
}
