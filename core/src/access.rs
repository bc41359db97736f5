//! Resolves what a user may do inside a workspace.
//!
//! Personal workspaces only ever grant access to their owner; the membership
//! table is consulted for team workspaces alone.

use anyhow::Result;

use crate::{
    db::Database,
    membership::WorkspaceRole,
    workspace::{WorkspaceRecord, WorkspaceStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// The user is `workspaces.owner_id`.
    Owner,
    /// Granted through a membership row.
    Role(WorkspaceRole),
}

impl AccessLevel {
    pub fn can_view(self) -> bool {
        true
    }

    pub fn can_edit(self) -> bool {
        true
    }

    pub fn can_manage_members(self) -> bool {
        match self {
            Self::Owner => true,
            Self::Role(role) => role.can_manage_members(),
        }
    }

    /// Owner by record or by an explicit `owner` membership.
    pub fn is_owner(self) -> bool {
        matches!(self, Self::Owner | Self::Role(WorkspaceRole::Owner))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Role(role) => role.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceAccess {
    pub workspace: WorkspaceRecord,
    pub level: AccessLevel,
}

#[derive(Debug, Clone)]
pub enum AccessDecision {
    NotFound,
    Denied,
    Granted(WorkspaceAccess),
}

impl AccessDecision {
    pub fn level(&self) -> Option<AccessLevel> {
        match self {
            Self::Granted(access) => Some(access.level),
            _ => None,
        }
    }
}

/// Decide access from already-loaded rows.
///
/// `member_role` is the raw stored role, so an unrecognised value denies.
pub fn decide(
    workspace: Option<WorkspaceRecord>,
    user_id: &str,
    member_role: Option<&str>,
) -> AccessDecision {
    let Some(workspace) = workspace else {
        return AccessDecision::NotFound;
    };

    if workspace.owner_id.as_str() == user_id {
        return AccessDecision::Granted(WorkspaceAccess {
            workspace,
            level: AccessLevel::Owner,
        });
    }

    if !workspace.is_team() {
        return AccessDecision::Denied;
    }

    match member_role.and_then(|role| role.parse::<WorkspaceRole>().ok()) {
        Some(role) => AccessDecision::Granted(WorkspaceAccess {
            workspace,
            level: AccessLevel::Role(role),
        }),
        None => AccessDecision::Denied,
    }
}

#[derive(Clone)]
pub struct AccessResolver {
    workspaces: WorkspaceStore,
}

impl AccessResolver {
    pub fn new(database: &Database) -> Self {
        Self {
            workspaces: WorkspaceStore::new(database),
        }
    }

    pub async fn resolve(&self, user_id: &str, workspace_id: &str) -> Result<AccessDecision> {
        let Some(workspace) = self.workspaces.find_by_id(workspace_id).await? else {
            return Ok(AccessDecision::NotFound);
        };

        let member_role = if workspace.is_team() && workspace.owner_id.as_str() != user_id {
            self.workspaces
                .find_member_role(workspace_id, user_id)
                .await?
        } else {
            None
        };

        Ok(decide(Some(workspace), user_id, member_role.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ids::{UserId, WorkspaceId},
        user::{UserRole, UserStore},
        workspace::{NewWorkspace, WorkspaceKind},
    };

    fn workspace(owner: &str, kind: WorkspaceKind) -> WorkspaceRecord {
        WorkspaceRecord {
            id: WorkspaceId::from("w1"),
            owner_id: UserId::from(owner),
            name: "Site".into(),
            kind,
            color: None,
            icon: None,
            description: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn owner_wins_regardless_of_membership_rows() {
        for role in [None, Some("member"), Some("admin"), Some("bogus")] {
            let decision = decide(Some(workspace("u1", WorkspaceKind::Team)), "u1", role);
            assert_eq!(decision.level(), Some(AccessLevel::Owner));
        }
        let personal = decide(Some(workspace("u1", WorkspaceKind::Personal)), "u1", None);
        assert_eq!(personal.level(), Some(AccessLevel::Owner));
    }

    #[test]
    fn team_without_row_is_denied() {
        assert!(matches!(
            decide(Some(workspace("u1", WorkspaceKind::Team)), "u2", None),
            AccessDecision::Denied
        ));
    }

    #[test]
    fn personal_workspace_ignores_membership_rows() {
        assert!(matches!(
            decide(
                Some(workspace("u1", WorkspaceKind::Personal)),
                "u2",
                Some("admin"),
            ),
            AccessDecision::Denied
        ));
    }

    #[test]
    fn unknown_or_miscased_roles_deny() {
        for role in ["Admin", "OWNER", "viewer", ""] {
            assert!(matches!(
                decide(Some(workspace("u1", WorkspaceKind::Team)), "u2", Some(role)),
                AccessDecision::Denied
            ));
        }
    }

    #[test]
    fn member_management_is_limited_to_owners_and_admins() {
        assert!(AccessLevel::Owner.can_manage_members());
        assert!(AccessLevel::Role(WorkspaceRole::Owner).can_manage_members());
        assert!(AccessLevel::Role(WorkspaceRole::Admin).can_manage_members());
        assert!(!AccessLevel::Role(WorkspaceRole::Member).can_manage_members());
        assert!(AccessLevel::Role(WorkspaceRole::Member).can_edit());
    }

    #[test]
    fn missing_workspace_is_not_found() {
        assert!(matches!(decide(None, "u1", None), AccessDecision::NotFound));
    }

    #[tokio::test]
    async fn resolver_reads_membership_for_team_workspaces() {
        let (_dir, database) = crate::db::test_database().await;
        let users = UserStore::new(&database);
        let workspaces = WorkspaceStore::new(&database);
        let resolver = AccessResolver::new(&database);

        let owner = users
            .create("owner@example.com", "hash", None, UserRole::User)
            .await
            .unwrap();
        let member = users
            .create("member@example.com", "hash", None, UserRole::User)
            .await
            .unwrap();
        let team = workspaces
            .create(
                &owner.id,
                WorkspaceKind::Team,
                NewWorkspace {
                    name: "Crew",
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            resolver.resolve(&member.id, &team.id).await.unwrap(),
            AccessDecision::Denied
        ));
        workspaces
            .add_member(&team.id, &member.id, WorkspaceRole::Member, Some(&owner.id))
            .await
            .unwrap();
        assert_eq!(
            resolver
                .resolve(&member.id, &team.id)
                .await
                .unwrap()
                .level(),
            Some(AccessLevel::Role(WorkspaceRole::Member))
        );
        assert!(matches!(
            resolver.resolve(&member.id, "missing").await.unwrap(),
            AccessDecision::NotFound
        ));
    }
}
