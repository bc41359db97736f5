use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        Database,
        workspace_repo::{
            AddMemberParams, CreateWorkspaceParams, UpdateWorkspaceParams, WorkspaceRepositoryRef,
        },
    },
    ids::{UserId, WorkspaceId},
    membership::{
        MemberAddition, MemberRemoval, MemberWithUser, MembershipRecord, RoleChange, WorkspaceRole,
    },
};

pub const DEFAULT_PERSONAL_WORKSPACE_NAME: &str = "Personal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    Personal,
    Team,
}

impl WorkspaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Team => "team",
        }
    }
}

impl fmt::Display for WorkspaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "personal" => Ok(Self::Personal),
            "team" => Ok(Self::Team),
            other => Err(anyhow!("unknown workspace type: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub owner_id: UserId,
    pub name: String,
    pub kind: WorkspaceKind,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkspaceRecord {
    pub fn is_team(&self) -> bool {
        self.kind == WorkspaceKind::Team
    }
}

/// A workspace visible to a user plus that user's membership role, if any.
#[derive(Debug, Clone)]
pub struct UserWorkspace {
    pub workspace: WorkspaceRecord,
    pub member_role: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewWorkspace<'a> {
    pub name: &'a str,
    pub color: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceChanges<'a> {
    pub name: Option<&'a str>,
    pub color: Option<Option<&'a str>>,
    pub icon: Option<Option<&'a str>>,
    pub description: Option<Option<&'a str>>,
}

#[derive(Clone)]
pub struct WorkspaceStore {
    workspace_repo: WorkspaceRepositoryRef,
}

impl WorkspaceStore {
    pub fn new(database: &Database) -> Self {
        Self {
            workspace_repo: database.repositories().workspace_repo(),
        }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        kind: WorkspaceKind,
        input: NewWorkspace<'_>,
    ) -> Result<WorkspaceRecord> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(anyhow!("workspace name must not be empty"));
        }

        self.workspace_repo
            .create_workspace(CreateWorkspaceParams {
                id: WorkspaceId::generate(),
                owner_id: UserId::from(owner_id),
                name: name.to_owned(),
                kind,
                color: normalize_optional(input.color),
                icon: normalize_optional(input.icon),
                description: normalize_optional(input.description),
                created_at: Utc::now().timestamp(),
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        self.workspace_repo.fetch_workspace(id).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<UserWorkspace>> {
        self.workspace_repo.list_workspaces_for_user(user_id).await
    }

    pub async fn update(
        &self,
        id: &str,
        changes: WorkspaceChanges<'_>,
    ) -> Result<Option<WorkspaceRecord>> {
        let name = changes
            .name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        let color = changes.color.map(normalize_optional);
        let icon = changes.icon.map(normalize_optional);
        let description = changes.description.map(normalize_optional);

        if name.is_none() && color.is_none() && icon.is_none() && description.is_none() {
            return self.find_by_id(id).await;
        }

        let updated = self
            .workspace_repo
            .update_workspace(UpdateWorkspaceParams {
                id: id.to_owned(),
                name,
                color,
                icon,
                description,
                updated_at: Utc::now().timestamp(),
            })
            .await?;

        if !updated {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.workspace_repo.delete_workspace(id).await
    }

    pub async fn list_members_with_users(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>> {
        self.workspace_repo
            .list_members_with_users(workspace_id)
            .await
    }

    pub async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        self.workspace_repo.get_member(workspace_id, user_id).await
    }

    pub async fn find_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<String>> {
        self.workspace_repo
            .find_member_role(workspace_id, user_id)
            .await
    }

    pub async fn count_owners(&self, workspace_id: &str) -> Result<i64> {
        self.workspace_repo.count_owners(workspace_id).await
    }

    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
        invited_by: Option<&str>,
    ) -> Result<MemberAddition> {
        self.workspace_repo
            .add_member(AddMemberParams {
                workspace_id: workspace_id.to_owned(),
                user_id: user_id.to_owned(),
                role,
                invited_by: invited_by.map(ToOwned::to_owned),
                joined_at: Utc::now().timestamp(),
            })
            .await
    }

    pub async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<RoleChange> {
        self.workspace_repo
            .update_member_role(workspace_id, user_id, role)
            .await
    }

    pub async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<MemberRemoval> {
        self.workspace_repo
            .remove_member(workspace_id, user_id)
            .await
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
