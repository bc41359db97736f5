use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::UserId,
    user::{UserRecord, UserRole},
};

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub created_at: i64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord>;

    /// `email` is expected to be normalized already.
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn fetch_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserRecord>>;

    async fn update_name(&self, id: &str, name: Option<&str>, updated_at: i64) -> Result<bool>;

    async fn set_active(&self, id: &str, active: bool, updated_at: i64) -> Result<bool>;

    async fn set_role(&self, id: &str, role: UserRole, updated_at: i64) -> Result<bool>;

    async fn set_permissions(
        &self,
        id: &str,
        permissions: &[String],
        updated_at: i64,
    ) -> Result<bool>;
}

pub type UserRepositoryRef = Arc<dyn UserRepository>;
