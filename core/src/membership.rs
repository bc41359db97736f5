use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::ids::{UserId, WorkspaceId};

/// Role of an explicit team membership. Parsing is case-sensitive; unknown
/// values are rejected when written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Member,
}

impl WorkspaceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn can_manage_members(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(anyhow!("unknown workspace role: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MembershipRecord {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: i64,
    pub invited_by: Option<UserId>,
}

impl MembershipRecord {
    pub fn parsed_role(&self) -> Option<WorkspaceRole> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone)]
pub struct MemberWithUser {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: i64,
    pub invited_by: Option<UserId>,
    pub email: String,
    pub name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub enum MemberAddition {
    Added(MembershipRecord),
    AlreadyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRemoval {
    Removed,
    NotMember,
    LastOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Updated,
    NotMember,
    LastOwner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_sensitive() {
        assert_eq!("owner".parse::<WorkspaceRole>().unwrap(), WorkspaceRole::Owner);
        assert!("Owner".parse::<WorkspaceRole>().is_err());
        assert!("viewer".parse::<WorkspaceRole>().is_err());
    }

    #[test]
    fn only_owner_and_admin_manage_members() {
        assert!(WorkspaceRole::Owner.can_manage_members());
        assert!(WorkspaceRole::Admin.can_manage_members());
        assert!(!WorkspaceRole::Member.can_manage_members());
    }
}
