// Generic CRUD handlers shared by every workspace resource kind

use anyhow::Error as AnyError;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use taskhive_core::{
    access::WorkspaceAccess,
    resource::{
        ResourceRecord, ResourceStore, ValidationError, WorkspaceResource, decode_body, merge_patch,
    },
};

use crate::{auth::resolve_workspace_access, error::AppError, state::AppState, types::StatusFilter};

pub(crate) async fn list_resources_handler<T: WorkspaceResource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;

    let status = filter
        .status
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(str::parse::<T::Status>)
        .transpose()?;

    let records = ResourceStore::<T>::new(&state.database)
        .list(&access.workspace.id, status)
        .await
        .map_err(store_error)?;

    let items = records
        .iter()
        .map(|record| record_json(&state, record))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(envelope(T::KIND.plural(), JsonValue::Array(items))))
}

pub(crate) async fn create_resource_handler<T: WorkspaceResource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse, AppError> {
    let (auth, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;

    let body = decode_body::<T>(payload)?;
    ensure_assignees_are_members(&state, &access, &body).await?;

    let record = ResourceStore::<T>::new(&state.database)
        .create(&access.workspace.id, &auth.user.id, body)
        .await
        .map_err(store_error)?;

    Ok((
        StatusCode::CREATED,
        Json(envelope(T::KIND.singular(), record_json(&state, &record)?)),
    ))
}

pub(crate) async fn get_resource_handler<T: WorkspaceResource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    let record = fetch_record::<T>(&state, &access, &id).await?;

    Ok(Json(envelope(T::KIND.singular(), record_json(&state, &record)?)))
}

pub(crate) async fn update_resource_handler<T: WorkspaceResource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, id)): Path<(String, String)>,
    Json(patch): Json<JsonValue>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;
    let current = fetch_record::<T>(&state, &access, &id).await?;

    let body = merge_patch(&current.body, patch)?;
    ensure_assignees_are_members(&state, &access, &body).await?;

    let record = ResourceStore::<T>::new(&state.database)
        .replace(current, body)
        .await
        .map_err(store_error)?
        .ok_or_else(|| AppError::resource_not_found(T::KIND.label(), &id))?;

    Ok(Json(envelope(T::KIND.singular(), record_json(&state, &record)?)))
}

pub(crate) async fn delete_resource_handler<T: WorkspaceResource>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (_, access) = resolve_workspace_access(&state, &headers, &workspace_id).await?;

    let deleted = ResourceStore::<T>::new(&state.database)
        .delete(&access.workspace.id, &id)
        .await
        .map_err(store_error)?;
    if !deleted {
        return Err(AppError::resource_not_found(T::KIND.label(), &id));
    }

    let mut body = Map::new();
    body.insert("success".to_owned(), JsonValue::Bool(true));
    body.insert(
        "message".to_owned(),
        JsonValue::String(format!("{} deleted", T::KIND.label())),
    );
    Ok(Json(JsonValue::Object(body)))
}

async fn fetch_record<T: WorkspaceResource>(
    state: &AppState,
    access: &WorkspaceAccess,
    id: &str,
) -> Result<ResourceRecord<T>, AppError> {
    ResourceStore::<T>::new(&state.database)
        .get(&access.workspace.id, id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| AppError::resource_not_found(T::KIND.label(), id))
}

/// Every user a body points at must be the owner or, on a team workspace, a member.
async fn ensure_assignees_are_members<T: WorkspaceResource>(
    state: &AppState,
    access: &WorkspaceAccess,
    body: &T,
) -> Result<(), AppError> {
    let workspace = &access.workspace;
    for user_id in body.referenced_users() {
        if user_id == workspace.owner_id.as_str() {
            continue;
        }
        let is_member = workspace.is_team()
            && state
                .workspace_store
                .find_member_role(&workspace.id, user_id)
                .await
                .map_err(AppError::from_anyhow)?
                .is_some();
        if !is_member {
            return Err(AppError::bad_request(format!(
                "user {user_id} is not a member of this workspace"
            ))
            .with_name("ASSIGNEE_NOT_A_MEMBER"));
        }
    }
    Ok(())
}

/// Serialized record, with the `_id` alias when legacy clients are enabled.
pub(crate) fn record_json<R: Serialize>(
    state: &AppState,
    record: &R,
) -> Result<JsonValue, AppError> {
    let mut value =
        serde_json::to_value(record).map_err(|err| AppError::internal(err.into()))?;
    if state.config.legacy_id_alias {
        if let JsonValue::Object(fields) = &mut value {
            if let Some(id) = fields.get("id").cloned() {
                fields.insert("_id".to_owned(), id);
            }
        }
    }
    Ok(value)
}

fn envelope(key: &str, value: JsonValue) -> JsonValue {
    let mut body = Map::new();
    body.insert("success".to_owned(), JsonValue::Bool(true));
    body.insert(key.to_owned(), value);
    JsonValue::Object(body)
}

fn store_error(error: AnyError) -> AppError {
    match error.downcast::<ValidationError>() {
        Ok(validation) => validation.into(),
        Err(error) => AppError::from_anyhow(error),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use taskhive_core::{
        membership::WorkspaceRole,
        resources::{Order, Roster, Task},
    };

    use super::*;
    use crate::test_support::{
        bearer_headers, response_json, seed_personal_workspace, seed_team_workspace, seed_user,
        setup_state, setup_state_with,
    };

    #[tokio::test]
    async fn task_crud_round_trip() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_team_workspace(&state, &owner, "Kitchen").await;
        let headers = bearer_headers(&state, &owner);
        let ws = workspace.id.to_string();

        let (status, json) = response_json(
            create_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Json(json!({ "title": "Prep sauces", "priority": "high", "tags": ["prep"] })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(json["success"], true);
        assert_eq!(json["task"]["title"], "Prep sauces");
        assert_eq!(json["task"]["status"], "todo");
        assert_eq!(json["task"]["workspaceId"], ws.as_str());
        assert!(json["task"].get("_id").is_none());
        let id = json["task"]["id"].as_str().expect("id").to_owned();

        let (status, json) = response_json(
            update_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path((ws.clone(), id.clone())),
                Json(json!({ "status": "done" })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["task"]["status"], "done");
        assert_eq!(json["task"]["priority"], "high");

        let (status, json) = response_json(
            list_resources_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Query(StatusFilter {
                    status: Some("todo".into()),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["tasks"], json!([]));

        let (status, json) = response_json(
            delete_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path((ws.clone(), id.clone())),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["message"], "Task deleted");

        let (status, _) = response_json(
            get_resource_handler::<Task>(State(state.clone()), headers, Path((ws, id))).await,
        )
        .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn invalid_payloads_and_filters_are_bad_requests() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_team_workspace(&state, &owner, "Kitchen").await;
        let headers = bearer_headers(&state, &owner);
        let ws = workspace.id.to_string();

        let (status, _) = response_json(
            list_resources_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Query(StatusFilter {
                    status: Some("finished".into()),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);

        let (status, json) = response_json(
            create_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Json(json!({ "title": "  " })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(json["name"], "VALIDATION_ERROR");

        let (status, _) = response_json(
            create_resource_handler::<Order>(
                State(state.clone()),
                headers,
                Path(ws),
                Json(json!({ "supplier": "Fresh Co", "lines": [{ "item": "Milk", "quantity": -1 }] })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn strangers_and_missing_workspaces_are_gated() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let stranger = seed_user(&state, "stranger@example.com").await;
        let workspace = seed_personal_workspace(&state, &owner).await;

        let (status, _) = response_json(
            list_resources_handler::<Task>(
                State(state.clone()),
                bearer_headers(&state, &stranger),
                Path(workspace.id.to_string()),
                Query(StatusFilter::default()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 403);

        let (status, _) = response_json(
            list_resources_handler::<Task>(
                State(state.clone()),
                bearer_headers(&state, &owner),
                Path("missing".into()),
                Query(StatusFilter::default()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn assignees_must_belong_to_the_workspace() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let member = seed_user(&state, "member@example.com").await;
        let outsider = seed_user(&state, "outsider@example.com").await;
        let workspace = seed_team_workspace(&state, &owner, "Kitchen").await;
        state
            .workspace_store
            .add_member(&workspace.id, &member.id, WorkspaceRole::Member, None)
            .await
            .expect("add");
        let headers = bearer_headers(&state, &member);
        let ws = workspace.id.to_string();

        let (status, _) = response_json(
            create_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Json(json!({ "title": "Mop floors", "assignedTo": owner.id.as_str() })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);

        let (status, json) = response_json(
            create_resource_handler::<Task>(
                State(state.clone()),
                headers.clone(),
                Path(ws.clone()),
                Json(json!({ "title": "Mop floors", "assignedTo": outsider.id.as_str() })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(json["name"], "ASSIGNEE_NOT_A_MEMBER");

        let (status, _) = response_json(
            create_resource_handler::<Roster>(
                State(state.clone()),
                headers,
                Path(ws),
                Json(json!({
                    "weekStart": "2024-03-04",
                    "shifts": [{
                        "userId": outsider.id.as_str(),
                        "day": "2024-03-05",
                        "start": "09:00",
                        "end": "17:00"
                    }]
                })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn derived_values_and_legacy_alias() {
        let (_dir, _database, state) =
            setup_state_with(|config| config.legacy_id_alias = true).await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_personal_workspace(&state, &owner).await;

        let (status, json) = response_json(
            create_resource_handler::<Order>(
                State(state.clone()),
                bearer_headers(&state, &owner),
                Path(workspace.id.to_string()),
                Json(json!({
                    "supplier": "Fresh Co",
                    "lines": [
                        { "item": "Milk", "quantity": 4, "unitPrice": 1.25 },
                        { "item": "Eggs", "quantity": 2, "unitPrice": 3.1 }
                    ]
                })),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(json["order"]["total"], 11.2);
        assert_eq!(json["order"]["_id"], json["order"]["id"]);
    }
}
