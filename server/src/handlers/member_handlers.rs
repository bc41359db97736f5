// Workspace membership handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    auth::resolve_workspace_access,
    error::AppError,
    state::AppState,
    types::{
        AddMemberRequest, MemberEnvelope, MemberResponse, MembersEnvelope, MessageResponse,
        UpdateMemberRoleRequest,
    },
    workspace::members,
};

pub(crate) async fn list_members_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    let members = members::list_members(&state, &access).await?;

    Ok(Json(MembersEnvelope {
        success: true,
        members: members.into_iter().map(MemberResponse::from).collect(),
    }))
}

pub(crate) async fn add_member_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (auth, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    let member = members::add_member(
        &state,
        &auth.user,
        &access,
        &payload.email,
        payload.role.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MemberEnvelope {
            success: true,
            member: MemberResponse::from(member),
        }),
    ))
}

pub(crate) async fn update_member_role_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, member_id)): Path<(String, String)>,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    let member = members::update_member_role(&state, &access, &member_id, &payload.role).await?;

    Ok(Json(MemberEnvelope {
        success: true,
        member: MemberResponse::from(member),
    }))
}

pub(crate) async fn remove_member_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, member_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (auth, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    members::remove_member(&state, &auth.user, &access, &member_id).await?;

    Ok(Json(MessageResponse::new("Member removed")))
}
