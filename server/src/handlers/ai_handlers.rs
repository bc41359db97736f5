// AI assistance handlers; they always answer 200 with a possibly empty list

use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use chrono::Utc;
use taskhive_core::{resource::ResourceStore, resources::Task};

use crate::{
    ai::{TaskBrief, WorkingHours},
    auth::{authenticate_rest_request, require_workspace_access},
    error::AppError,
    state::AppState,
    types::{ExtractTasksRequest, PlanDayRequest, PrioritizeRequest, SuggestionsEnvelope},
};

pub(crate) async fn extract_tasks_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExtractTasksRequest>,
) -> Result<impl IntoResponse, AppError> {
    authenticate_rest_request(&state, &headers).await?;
    let suggestions = state.ai.extract_tasks(&payload.text).await;
    Ok(Json(SuggestionsEnvelope::new(suggestions)))
}

pub(crate) async fn prioritize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PrioritizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let tasks = collect_tasks(
        &state,
        &auth.user.id,
        payload.workspace_id.as_deref(),
        payload.tasks,
    )
    .await?;

    let suggestions = state.ai.prioritize_tasks(&tasks).await;
    Ok(Json(SuggestionsEnvelope::new(suggestions)))
}

pub(crate) async fn plan_day_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PlanDayRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let tasks = collect_tasks(
        &state,
        &auth.user.id,
        payload.workspace_id.as_deref(),
        payload.tasks,
    )
    .await?;

    let defaults = WorkingHours::default();
    let hours = WorkingHours {
        start: payload.start.as_deref().unwrap_or(defaults.start),
        end: payload.end.as_deref().unwrap_or(defaults.end),
    };
    let date = payload.date.unwrap_or_else(|| Utc::now().date_naive());

    let suggestions = state.ai.plan_day(&tasks, date, hours).await;
    Ok(Json(SuggestionsEnvelope::new(suggestions)))
}

/// Inline tasks followed by the open tasks of `workspace_id`, if given.
async fn collect_tasks(
    state: &AppState,
    user_id: &str,
    workspace_id: Option<&str>,
    mut tasks: Vec<TaskBrief>,
) -> Result<Vec<TaskBrief>, AppError> {
    let Some(workspace_id) = workspace_id else {
        return Ok(tasks);
    };

    let access = require_workspace_access(state, user_id, workspace_id).await?;
    let records = ResourceStore::<Task>::new(&state.database)
        .list(&access.workspace.id, None)
        .await
        .map_err(AppError::from_anyhow)?;

    tasks.extend(
        records
            .iter()
            .filter(|record| record.body.status.is_open())
            .map(TaskBrief::from),
    );
    Ok(tasks)
}
