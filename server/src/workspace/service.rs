use std::sync::Arc;

use axum::extract::FromRef;
use taskhive_core::{
    access::{AccessDecision, AccessLevel, WorkspaceAccess, decide},
    workspace::{NewWorkspace, WorkspaceChanges, WorkspaceKind, WorkspaceRecord, WorkspaceStore},
};
use tracing::info;

use crate::{AppError, state::AppState};

pub struct WorkspaceService {
    workspace_store: WorkspaceStore,
}

/// Input for a new workspace; `kind` defaults to team.
#[derive(Debug, Clone, Default)]
pub struct CreateWorkspace<'a> {
    pub name: &'a str,
    pub kind: Option<WorkspaceKind>,
    pub color: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl WorkspaceService {
    pub fn new(workspace_store: WorkspaceStore) -> Self {
        Self { workspace_store }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        input: CreateWorkspace<'_>,
    ) -> Result<WorkspaceRecord, AppError> {
        if input.name.trim().is_empty() {
            return Err(AppError::bad_request("workspace name must not be empty"));
        }

        let kind = input.kind.unwrap_or(WorkspaceKind::Team);
        let workspace = self
            .workspace_store
            .create(
                owner_id,
                kind,
                NewWorkspace {
                    name: input.name,
                    color: input.color,
                    icon: input.icon,
                    description: input.description,
                },
            )
            .await
            .map_err(AppError::from_anyhow)?;

        info!(workspace_id = %workspace.id, owner_id, kind = kind.as_str(), "workspace created");
        Ok(workspace)
    }

    /// Owned workspaces plus team workspaces with a membership row, each with
    /// the caller's access level. Rows carrying an unknown role are skipped.
    pub async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<(WorkspaceRecord, AccessLevel)>, AppError> {
        let rows = self
            .workspace_store
            .list_for_user(user_id)
            .await
            .map_err(AppError::from_anyhow)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                match decide(Some(row.workspace), user_id, row.member_role.as_deref()) {
                    AccessDecision::Granted(access) => Some((access.workspace, access.level)),
                    AccessDecision::NotFound | AccessDecision::Denied => None,
                }
            })
            .collect())
    }

    pub async fn update(
        &self,
        access: &WorkspaceAccess,
        changes: WorkspaceChanges<'_>,
    ) -> Result<WorkspaceRecord, AppError> {
        if !access.level.can_manage_members() {
            return Err(AppError::forbidden(
                "Only owners and admins can update the workspace",
            ));
        }
        if changes.name.is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::bad_request("workspace name must not be empty"));
        }

        let workspace_id = access.workspace.id.as_str();
        self.workspace_store
            .update(workspace_id, changes)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::workspace_not_found(workspace_id))
    }

    pub async fn delete(&self, access: &WorkspaceAccess) -> Result<(), AppError> {
        if !access.level.is_owner() {
            return Err(AppError::forbidden("Only owners can delete the workspace"));
        }

        let workspace_id = access.workspace.id.as_str();
        let deleted = self
            .workspace_store
            .delete(workspace_id)
            .await
            .map_err(AppError::from_anyhow)?;
        if !deleted {
            return Err(AppError::workspace_not_found(workspace_id));
        }
        info!(workspace_id, "workspace deleted");
        Ok(())
    }
}

impl FromRef<AppState> for Arc<WorkspaceService> {
    fn from_ref(state: &AppState) -> Arc<WorkspaceService> {
        Arc::clone(&state.workspace_service)
    }
}
