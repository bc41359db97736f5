use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::workspace_repo::{
        AddMemberParams, CreateWorkspaceParams, UpdateWorkspaceParams, WorkspaceRepository,
    },
    ids::{UserId, WorkspaceId},
    membership::{
        MemberAddition, MemberRemoval, MemberWithUser, MembershipRecord, RoleChange, WorkspaceRole,
    },
    workspace::{UserWorkspace, WorkspaceKind, WorkspaceRecord},
};

const WORKSPACE_COLUMNS: &str =
    "w.id, w.owner_id, w.name, w.kind, w.color, w.icon, w.description, w.created_at, w.updated_at";

pub struct SqliteWorkspaceRepository {
    pool: Pool<Sqlite>,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_workspace_row(row: &SqliteRow) -> Result<WorkspaceRecord> {
        let kind: String = row.get("kind");
        Ok(WorkspaceRecord {
            id: WorkspaceId::from(row.get::<String, _>("id")),
            owner_id: UserId::from(row.get::<String, _>("owner_id")),
            name: row.get("name"),
            kind: kind.parse()?,
            color: row.get("color"),
            icon: row.get("icon"),
            description: row.get("description"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_membership_row(row: &SqliteRow) -> MembershipRecord {
        MembershipRecord {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get("role"),
            joined_at: row.get("joined_at"),
            invited_by: row
                .get::<Option<String>, _>("invited_by")
                .map(UserId::from),
        }
    }

    async fn member_exists(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord> {
        let CreateWorkspaceParams {
            id,
            owner_id,
            name,
            kind,
            color,
            icon,
            description,
            created_at,
        } = params;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO workspaces (
                 id,
                 owner_id,
                 name,
                 kind,
                 color,
                 icon,
                 description,
                 created_at,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(&name)
        .bind(kind.as_str())
        .bind(color.as_deref())
        .bind(icon.as_deref())
        .bind(description.as_deref())
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        if kind == WorkspaceKind::Team {
            sqlx::query(
                "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at, invited_by)
                 VALUES (?, ?, 'owner', ?, NULL)",
            )
            .bind(&id)
            .bind(&owner_id)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(WorkspaceRecord {
            id,
            owner_id,
            name,
            kind,
            color,
            icon,
            description,
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w WHERE w.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_workspace_row).transpose()
    }

    async fn list_workspaces_for_user(&self, user_id: &str) -> Result<Vec<UserWorkspace>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKSPACE_COLUMNS}, wm.role AS member_role
             FROM workspaces w
             LEFT JOIN workspace_members wm
               ON wm.workspace_id = w.id AND wm.user_id = ?
             WHERE w.owner_id = ?
                OR (w.kind = 'team' AND wm.user_id IS NOT NULL)
             ORDER BY w.created_at ASC, w.id ASC"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UserWorkspace {
                    workspace: Self::map_workspace_row(row)?,
                    member_role: row.get("member_role"),
                })
            })
            .collect()
    }

    async fn update_workspace(&self, params: UpdateWorkspaceParams) -> Result<bool> {
        let UpdateWorkspaceParams {
            id,
            name,
            color,
            icon,
            description,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::new("UPDATE workspaces SET updated_at = ");
        builder.push_bind(updated_at);

        if let Some(name) = name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(color) = color {
            builder.push(", color = ");
            builder.push_bind(color);
        }
        if let Some(icon) = icon {
            builder.push(", icon = ");
            builder.push_bind(icon);
        }
        if let Some(description) = description {
            builder.push(", description = ");
            builder.push_bind(description);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_workspace(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members_with_users(&self, workspace_id: &str) -> Result<Vec<MemberWithUser>> {
        let rows = sqlx::query(
            "SELECT
                 wm.workspace_id,
                 wm.user_id,
                 wm.role,
                 wm.joined_at,
                 wm.invited_by,
                 u.email,
                 u.name,
                 u.active
             FROM workspace_members wm
             JOIN users u ON u.id = wm.user_id
             WHERE wm.workspace_id = ?
             ORDER BY wm.joined_at ASC, u.email ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MemberWithUser {
                workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
                user_id: UserId::from(row.get::<String, _>("user_id")),
                role: row.get("role"),
                joined_at: row.get("joined_at"),
                invited_by: row
                    .get::<Option<String>, _>("invited_by")
                    .map(UserId::from),
                email: row.get("email"),
                name: row.get("name"),
                active: row.get::<i64, _>("active") != 0,
            })
            .collect())
    }

    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(
            "SELECT workspace_id, user_id, role, joined_at, invited_by
             FROM workspace_members
             WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::map_membership_row))
    }

    async fn find_member_role(&self, workspace_id: &str, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT role FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("role")))
    }

    async fn count_owners(&self, workspace_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS owners FROM workspace_members WHERE workspace_id = ? AND role = 'owner'",
        )
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("owners"))
    }

    async fn add_member(&self, params: AddMemberParams) -> Result<MemberAddition> {
        let AddMemberParams {
            workspace_id,
            user_id,
            role,
            invited_by,
            joined_at,
        } = params;

        let result = sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at, invited_by)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(workspace_id, user_id) DO NOTHING",
        )
        .bind(&workspace_id)
        .bind(&user_id)
        .bind(role.as_str())
        .bind(joined_at)
        .bind(invited_by.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(MemberAddition::AlreadyMember);
        }

        Ok(MemberAddition::Added(MembershipRecord {
            workspace_id: WorkspaceId::from(workspace_id),
            user_id: UserId::from(user_id),
            role: role.as_str().to_owned(),
            joined_at,
            invited_by: invited_by.map(UserId::from),
        }))
    }

    async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: WorkspaceRole,
    ) -> Result<RoleChange> {
        let result = sqlx::query(
            "UPDATE workspace_members
             SET role = ?
             WHERE workspace_id = ? AND user_id = ?
               AND (
                   role <> 'owner'
                   OR ? = 'owner'
                   OR (SELECT COUNT(*) FROM workspace_members
                       WHERE workspace_id = ? AND role = 'owner') > 1
               )",
        )
        .bind(role.as_str())
        .bind(workspace_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(workspace_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(RoleChange::Updated);
        }

        if self.member_exists(workspace_id, user_id).await? {
            Ok(RoleChange::LastOwner)
        } else {
            Ok(RoleChange::NotMember)
        }
    }

    async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<MemberRemoval> {
        let result = sqlx::query(
            "DELETE FROM workspace_members
             WHERE workspace_id = ? AND user_id = ?
               AND (
                   role <> 'owner'
                   OR (SELECT COUNT(*) FROM workspace_members
                       WHERE workspace_id = ? AND role = 'owner') > 1
               )",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(workspace_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(MemberRemoval::Removed);
        }

        // Nothing deleted: either there is no row, or it is the last owner.
        if self.member_exists(workspace_id, user_id).await? {
            Ok(MemberRemoval::LastOwner)
        } else {
            Ok(MemberRemoval::NotMember)
        }
    }
}
