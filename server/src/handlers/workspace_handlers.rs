// Workspace management handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use taskhive_core::{access::AccessLevel, workspace::WorkspaceChanges};

use crate::{
    auth::{authenticate_rest_request, resolve_workspace_access},
    error::AppError,
    state::AppState,
    types::{
        CreateWorkspaceRequest, MessageResponse, UpdateWorkspaceRequest, WorkspaceEnvelope,
        WorkspaceResponse, WorkspacesEnvelope,
    },
    workspace::service::CreateWorkspace,
};

pub(crate) async fn create_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let workspace = state
        .workspace_service
        .create(
            &auth.user.id,
            CreateWorkspace {
                name: &payload.name,
                kind: payload.kind,
                color: payload.color.as_deref(),
                icon: payload.icon.as_deref(),
                description: payload.description.as_deref(),
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WorkspaceEnvelope {
            success: true,
            workspace: WorkspaceResponse::new(&workspace, Some(AccessLevel::Owner)),
        }),
    ))
}

pub(crate) async fn list_workspaces_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let workspaces = state.workspace_service.list_for_user(&auth.user.id).await?;

    Ok(Json(WorkspacesEnvelope {
        success: true,
        workspaces: workspaces
            .iter()
            .map(|(workspace, level)| WorkspaceResponse::new(workspace, Some(*level)))
            .collect(),
    }))
}

pub(crate) async fn get_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;

    Ok(Json(WorkspaceEnvelope {
        success: true,
        workspace: WorkspaceResponse::new(&access.workspace, Some(access.level)),
    }))
}

pub(crate) async fn update_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(payload): Json<UpdateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;

    let workspace = state
        .workspace_service
        .update(
            &access,
            WorkspaceChanges {
                name: payload.name.as_deref(),
                color: payload.color.as_deref().map(Some),
                icon: payload.icon.as_deref().map(Some),
                description: payload.description.as_deref().map(Some),
            },
        )
        .await?;

    Ok(Json(WorkspaceEnvelope {
        success: true,
        workspace: WorkspaceResponse::new(&workspace, Some(access.level)),
    }))
}

pub(crate) async fn delete_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    state.workspace_service.delete(&access).await?;

    Ok(Json(MessageResponse::new("Workspace deleted")))
}

#[cfg(test)]
mod tests {
    use taskhive_core::workspace::WorkspaceKind;

    use super::*;
    use crate::test_support::{
        bearer_headers, response_json, seed_team_workspace, seed_user, setup_state,
    };

    #[tokio::test]
    async fn create_list_and_get() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let headers = bearer_headers(&state, &owner);

        let (status, json) = response_json(
            create_workspace_handler(
                State(state.clone()),
                headers.clone(),
                Json(CreateWorkspaceRequest {
                    name: "Bistro".into(),
                    kind: None,
                    color: Some("#00ff00".into()),
                    icon: None,
                    description: None,
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(json["workspace"]["type"], "team");
        assert_eq!(json["workspace"]["accessLevel"], "owner");
        let workspace_id = json["workspace"]["id"].as_str().expect("id").to_owned();

        let (status, json) = response_json(
            list_workspaces_handler(State(state.clone()), headers.clone()).await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["workspaces"].as_array().map(Vec::len), Some(1));

        let (status, json) = response_json(
            get_workspace_handler(State(state.clone()), headers, Path(workspace_id)).await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["workspace"]["color"], "#00ff00");
    }

    #[tokio::test]
    async fn blank_name_and_strangers_are_rejected() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let stranger = seed_user(&state, "stranger@example.com").await;

        let (status, _) = response_json(
            create_workspace_handler(
                State(state.clone()),
                bearer_headers(&state, &owner),
                Json(CreateWorkspaceRequest {
                    name: " ".into(),
                    kind: Some(WorkspaceKind::Personal),
                    color: None,
                    icon: None,
                    description: None,
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);

        let workspace = seed_team_workspace(&state, &owner, "Private").await;
        let (status, json) = response_json(
            get_workspace_handler(
                State(state.clone()),
                bearer_headers(&state, &stranger),
                Path(workspace.id.to_string()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(json["name"], "WORKSPACE_ACCESS_DENIED");

        let (status, _) = response_json(
            get_workspace_handler(
                State(state.clone()),
                bearer_headers(&state, &owner),
                Path("missing".into()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn update_clears_fields_and_owner_deletes() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_team_workspace(&state, &owner, "Site").await;
        let headers = bearer_headers(&state, &owner);

        let (status, json) = response_json(
            update_workspace_handler(
                State(state.clone()),
                headers.clone(),
                Path(workspace.id.to_string()),
                Json(UpdateWorkspaceRequest {
                    name: Some("Site B".into()),
                    description: Some(String::new()),
                    icon: Some("hammer".into()),
                    ..UpdateWorkspaceRequest::default()
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["workspace"]["name"], "Site B");
        assert_eq!(json["workspace"]["icon"], "hammer");
        assert!(json["workspace"]["description"].is_null());

        let (status, json) = response_json(
            delete_workspace_handler(
                State(state.clone()),
                headers,
                Path(workspace.id.to_string()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["message"], "Workspace deleted");
    }
}
