use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        Database,
        user_repo::{CreateUserParams, UserRepositoryRef},
    },
    ids::UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
    Superadmin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(anyhow!("unknown user role: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub active: bool,
    pub permissions: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct UserStore {
    user_repo: UserRepositoryRef,
}

impl UserStore {
    pub fn new(database: &Database) -> Self {
        Self {
            user_repo: database.repositories().user_repo(),
        }
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
        role: UserRole,
    ) -> Result<UserRecord> {
        let now = Utc::now().timestamp();
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        self.user_repo
            .create_user(CreateUserParams {
                id: UserId::generate(),
                email: normalize_email(email),
                password_hash: password_hash.to_owned(),
                name,
                role,
                created_at: now,
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        self.user_repo.fetch_user_by_id(id).await
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.user_repo
            .fetch_user_by_email(&normalize_email(email))
            .await
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<UserRecord>> {
        self.user_repo
            .list_users(offset.max(0), limit.clamp(1, 200))
            .await
    }

    pub async fn update_profile(&self, id: &str, name: Option<&str>) -> Result<Option<UserRecord>> {
        let name = name.map(str::trim).filter(|value| !value.is_empty());
        let updated = self
            .user_repo
            .update_name(id, name, Utc::now().timestamp())
            .await?;
        if !updated {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        self.user_repo
            .set_active(id, active, Utc::now().timestamp())
            .await
    }

    pub async fn set_role(&self, id: &str, role: UserRole) -> Result<bool> {
        self.user_repo
            .set_role(id, role, Utc::now().timestamp())
            .await
    }

    pub async fn set_permissions(&self, id: &str, permissions: &[String]) -> Result<bool> {
        let mut normalized: Vec<String> = permissions
            .iter()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        self.user_repo
            .set_permissions(id, &normalized, Utc::now().timestamp())
            .await
    }
}
