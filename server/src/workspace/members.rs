use taskhive_core::{
    access::WorkspaceAccess,
    membership::{MemberAddition, MemberRemoval, MemberWithUser, RoleChange, WorkspaceRole},
    user::UserRecord,
};
use tracing::info;

use crate::{AppError, AppState};

/// Members of the workspace. A personal workspace reports its owner alone.
pub async fn list_members(
    state: &AppState,
    access: &WorkspaceAccess,
) -> Result<Vec<MemberWithUser>, AppError> {
    let workspace = &access.workspace;
    if workspace.is_team() {
        return state
            .workspace_store
            .list_members_with_users(&workspace.id)
            .await
            .map_err(AppError::from_anyhow);
    }

    let owner = state
        .user_store
        .find_by_id(&workspace.owner_id)
        .await
        .map_err(AppError::from_anyhow)?
        .ok_or_else(|| AppError::user_not_found("Workspace owner not found."))?;

    Ok(vec![MemberWithUser {
        workspace_id: workspace.id.clone(),
        user_id: owner.id,
        role: WorkspaceRole::Owner.as_str().to_owned(),
        joined_at: workspace.created_at,
        invited_by: None,
        email: owner.email,
        name: owner.name,
        active: owner.active,
    }])
}

pub async fn add_member(
    state: &AppState,
    actor: &UserRecord,
    access: &WorkspaceAccess,
    email: &str,
    role: Option<&str>,
) -> Result<MemberWithUser, AppError> {
    if !access.level.can_manage_members() {
        return Err(AppError::forbidden("Only owners and admins can add members"));
    }

    let workspace = &access.workspace;
    if !workspace.is_team() {
        return Err(AppError::invalid_operation(
            "Members can only be added to team workspaces",
        ));
    }

    let role = parse_role(role.unwrap_or(WorkspaceRole::Member.as_str()))?;

    let target = state
        .user_store
        .find_by_email(email)
        .await
        .map_err(AppError::from_anyhow)?
        .ok_or_else(|| AppError::user_not_found("No user with that email address."))?;

    if target.id == workspace.owner_id {
        return Err(AppError::already_a_member(&target.email));
    }

    let membership = match state
        .workspace_store
        .add_member(&workspace.id, &target.id, role, Some(&actor.id))
        .await
        .map_err(AppError::from_anyhow)?
    {
        MemberAddition::Added(membership) => membership,
        MemberAddition::AlreadyMember => return Err(AppError::already_a_member(&target.email)),
    };

    info!(
        workspace_id = %workspace.id,
        user_id = %target.id,
        role = role.as_str(),
        invited_by = %actor.id,
        "member added"
    );

    let inviter = actor.name.as_deref().unwrap_or(&actor.email);
    state
        .mailer
        .send_member_added(&target.email, &workspace.name, role.as_str(), inviter)
        .await;

    Ok(MemberWithUser {
        workspace_id: membership.workspace_id,
        user_id: membership.user_id,
        role: membership.role,
        joined_at: membership.joined_at,
        invited_by: membership.invited_by,
        email: target.email,
        name: target.name,
        active: target.active,
    })
}

pub async fn update_member_role(
    state: &AppState,
    access: &WorkspaceAccess,
    member_id: &str,
    role: &str,
) -> Result<MemberWithUser, AppError> {
    if !access.level.can_manage_members() {
        return Err(AppError::forbidden(
            "Only owners and admins can change member roles",
        ));
    }

    let role = parse_role(role)?;
    let workspace_id = access.workspace.id.as_str();

    match state
        .workspace_store
        .update_member_role(workspace_id, member_id, role)
        .await
        .map_err(AppError::from_anyhow)?
    {
        RoleChange::Updated => {}
        RoleChange::NotMember => return Err(AppError::member_not_found(workspace_id, member_id)),
        RoleChange::LastOwner => return Err(AppError::last_owner()),
    }

    info!(workspace_id, member_id, role = role.as_str(), "member role changed");
    find_member(state, workspace_id, member_id).await
}

pub async fn remove_member(
    state: &AppState,
    actor: &UserRecord,
    access: &WorkspaceAccess,
    member_id: &str,
) -> Result<(), AppError> {
    let removing_self = actor.id.as_str() == member_id;
    if !removing_self && !access.level.can_manage_members() {
        return Err(AppError::forbidden(
            "Only owners and admins can remove members",
        ));
    }

    let workspace_id = access.workspace.id.as_str();
    match state
        .workspace_store
        .remove_member(workspace_id, member_id)
        .await
        .map_err(AppError::from_anyhow)?
    {
        MemberRemoval::Removed => {
            info!(workspace_id, member_id, removing_self, "member removed");
            Ok(())
        }
        MemberRemoval::NotMember => Err(AppError::member_not_found(workspace_id, member_id)),
        MemberRemoval::LastOwner => Err(AppError::last_owner()),
    }
}

fn parse_role(role: &str) -> Result<WorkspaceRole, AppError> {
    role.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid role: {role}")))
}

async fn find_member(
    state: &AppState,
    workspace_id: &str,
    member_id: &str,
) -> Result<MemberWithUser, AppError> {
    state
        .workspace_store
        .list_members_with_users(workspace_id)
        .await
        .map_err(AppError::from_anyhow)?
        .into_iter()
        .find(|member| member.user_id.as_str() == member_id)
        .ok_or_else(|| AppError::member_not_found(workspace_id, member_id))
}
