use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::resource_repo::{ResourceRepository, ResourceRow},
    resource::ResourceKind,
};

const RESOURCE_COLUMNS: &str =
    "id, workspace_id, status, assigned_to, body, created_by, created_at, updated_at";

pub struct SqliteResourceRepository {
    pool: Pool<Sqlite>,
}

impl SqliteResourceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> Result<ResourceRow> {
        let body: String = row.get("body");
        let id: String = row.get("id");
        Ok(ResourceRow {
            body: serde_json::from_str(&body)
                .with_context(|| format!("resource {id} has a malformed body"))?,
            id,
            workspace_id: row.get("workspace_id"),
            status: row.get("status"),
            assigned_to: row.get("assigned_to"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ResourceRepository for SqliteResourceRepository {
    async fn insert(&self, kind: ResourceKind, row: ResourceRow) -> Result<()> {
        let body = serde_json::to_string(&row.body)?;
        sqlx::query(&format!(
            "INSERT INTO {table} ({RESOURCE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            table = kind.table()
        ))
        .bind(&row.id)
        .bind(&row.workspace_id)
        .bind(&row.status)
        .bind(row.assigned_to.as_deref())
        .bind(body)
        .bind(&row.created_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert {kind}"))?;
        Ok(())
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<ResourceRow>> {
        let row = sqlx::query(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM {table} WHERE workspace_id = ? AND id = ?",
            table = kind.table()
        ))
        .bind(workspace_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::map_row).transpose()
    }

    async fn list(
        &self,
        kind: ResourceKind,
        workspace_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<ResourceRow>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {RESOURCE_COLUMNS} FROM {table} WHERE workspace_id = ",
            table = kind.table()
        ));
        builder.push_bind(workspace_id);
        if let Some(status) = status {
            builder.push(" AND status = ");
            builder.push_bind(status);
        }
        builder.push(" ORDER BY created_at DESC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::map_row).collect()
    }

    async fn update(&self, kind: ResourceKind, row: ResourceRow) -> Result<bool> {
        let body = serde_json::to_string(&row.body)?;
        let result = sqlx::query(&format!(
            "UPDATE {table}
             SET status = ?, assigned_to = ?, body = ?, updated_at = ?
             WHERE workspace_id = ? AND id = ?",
            table = kind.table()
        ))
        .bind(&row.status)
        .bind(row.assigned_to.as_deref())
        .bind(body)
        .bind(row.updated_at)
        .bind(&row.workspace_id)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, kind: ResourceKind, workspace_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE workspace_id = ? AND id = ?",
            table = kind.table()
        ))
        .bind(workspace_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
