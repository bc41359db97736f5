use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::{UserId, WorkspaceId},
    membership::{
        MemberAddition, MemberRemoval, MemberWithUser, MembershipRecord, RoleChange, WorkspaceRole,
    },
    workspace::{UserWorkspace, WorkspaceKind, WorkspaceRecord},
};

#[derive(Debug, Clone)]
pub struct CreateWorkspaceParams {
    pub id: WorkspaceId,
    pub owner_id: UserId,
    pub name: String,
    pub kind: WorkspaceKind,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct UpdateWorkspaceParams {
    pub id: String,
    pub name: Option<String>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct AddMemberParams {
    pub workspace_id: String,
    pub user_id: String,
    pub role: WorkspaceRole,
    pub invited_by: Option<String>,
    pub joined_at: i64,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Team workspaces get the owner's membership row in the same transaction.
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord>;

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>>;

    async fn list_workspaces_for_user(&self, user_id: &str) -> Result<Vec<UserWorkspace>>;

    async fn update_workspace(&self, params: UpdateWorkspaceParams) -> Result<bool>;

    async fn delete_workspace(&self, id: &str) -> Result<bool>;

    async fn list_members_with_users(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>>;

    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>>;

    async fn find_member_role(&self, workspace_id: &str, user_id: &str) -> Result<Option<String>>;

    async fn count_owners(&self, workspace_id: &str) -> Result<i64>;

    /// Inserts unless a row for the pair exists; never duplicates.
    async fn add_member(&self, params: AddMemberParams) -> Result<MemberAddition>;

    /// Single conditional UPDATE: demoting the last owner is refused.
    async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<RoleChange>;

    /// Single conditional DELETE: the last owner row is never removed.
    async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<MemberRemoval>;
}

pub type WorkspaceRepositoryRef = Arc<dyn WorkspaceRepository>;
