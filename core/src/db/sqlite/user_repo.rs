use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::user_repo::{CreateUserParams, UserRepository},
    ids::UserId,
    user::{UserRecord, UserRole},
};

const USER_COLUMNS: &str =
    "id, email, name, password_hash, role, active, permissions, created_at, updated_at";

pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> Result<UserRecord> {
        let role: String = row.get("role");
        let permissions: String = row.get("permissions");
        Ok(UserRecord {
            id: UserId::from(row.get::<String, _>("id")),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: row.get("password_hash"),
            role: role.parse()?,
            active: row.get::<i64, _>("active") != 0,
            permissions: serde_json::from_str(&permissions)
                .context("decode user permissions")?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord> {
        let CreateUserParams {
            id,
            email,
            password_hash,
            name,
            role,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, active, permissions, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, '[]', ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(name.as_deref())
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;

        Ok(UserRecord {
            id,
            email,
            name,
            password_hash,
            role,
            active: true,
            permissions: Vec::new(),
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::map_row).transpose()
    }

    async fn fetch_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::map_row).transpose()
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn update_name(&self, id: &str, name: Option<&str>, updated_at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&self, id: &str, active: bool, updated_at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET active = ?, updated_at = ? WHERE id = ?")
            .bind(if active { 1_i64 } else { 0_i64 })
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_role(&self, id: &str, role: UserRole, updated_at: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_permissions(
        &self,
        id: &str,
        permissions: &[String],
        updated_at: i64,
    ) -> Result<bool> {
        let encoded = serde_json::to_string(permissions)?;
        let result = sqlx::query("UPDATE users SET permissions = ?, updated_at = ? WHERE id = ?")
            .bind(encoded)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
