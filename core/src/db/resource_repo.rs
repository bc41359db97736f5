use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::resource::ResourceKind;

/// Storage shape shared by every resource table.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub id: String,
    pub workspace_id: String,
    pub status: String,
    pub assigned_to: Option<String>,
    pub body: Value,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn insert(&self, kind: ResourceKind, row: ResourceRow) -> Result<()>;

    async fn fetch(
        &self,
        kind: ResourceKind,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<ResourceRow>>;

    async fn list(
        &self,
        kind: ResourceKind,
        workspace_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<ResourceRow>>;

    /// Overwrite status, assignee, body and `updated_at`.
    async fn update(&self, kind: ResourceKind, row: ResourceRow) -> Result<bool>;

    async fn delete(&self, kind: ResourceKind, workspace_id: &str, id: &str) -> Result<bool>;
}

pub type ResourceRepositoryRef = Arc<dyn ResourceRepository>;
