// Calendar connection and event handlers, keyed by `{provider}`

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use taskhive_core::calendar_connection::CalendarProviderKind;

use crate::{
    auth::authenticate_rest_request,
    calendar::CalendarEvent,
    error::AppError,
    state::AppState,
    types::{
        AuthUrlResponse, CalendarEventEnvelope, CalendarStatusResponse, ConnectCalendarRequest,
        MessageResponse,
    },
};

fn parse_provider(value: &str) -> Result<CalendarProviderKind, AppError> {
    value.parse().map_err(|_| {
        AppError::bad_request(format!("Unsupported calendar provider: {value}"))
            .with_name("UNSUPPORTED_PROVIDER")
    })
}

fn event_envelope(event: CalendarEvent) -> Json<CalendarEventEnvelope> {
    Json(CalendarEventEnvelope {
        success: true,
        event,
    })
}

pub(crate) async fn calendar_auth_url_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    let url = state.calendar.authorization_url(&auth.user.id, kind).await?;

    Ok(Json(AuthUrlResponse { success: true, url }))
}

pub(crate) async fn connect_calendar_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
    Json(payload): Json<ConnectCalendarRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    if payload.code.trim().is_empty() {
        return Err(AppError::bad_request("code is required"));
    }

    let connection = state
        .calendar
        .connect(&auth.user.id, kind, &payload.code, payload.state.as_deref())
        .await?;

    Ok(Json(CalendarStatusResponse::new(
        kind.as_str(),
        true,
        Some(&connection),
    )))
}

pub(crate) async fn disconnect_calendar_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;

    let message = if state.calendar.disconnect(&auth.user.id, kind).await? {
        format!("{kind} calendar disconnected")
    } else {
        format!("{kind} calendar was not connected")
    };
    Ok(Json(MessageResponse::new(message)))
}

pub(crate) async fn calendar_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    let connection = state.calendar.connection(&auth.user.id, kind).await?;

    Ok(Json(CalendarStatusResponse::new(
        kind.as_str(),
        state.calendar.is_configured(kind),
        connection.as_ref(),
    )))
}

pub(crate) async fn create_calendar_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(provider): Path<String>,
    Json(event): Json<CalendarEvent>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    let created = state
        .calendar
        .create_event(&auth.user.id, kind, &event)
        .await?;

    Ok((StatusCode::CREATED, event_envelope(created)))
}

pub(crate) async fn get_calendar_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((provider, event_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    let event = state
        .calendar
        .get_event(&auth.user.id, kind, &event_id)
        .await?;

    Ok(event_envelope(event))
}

pub(crate) async fn update_calendar_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((provider, event_id)): Path<(String, String)>,
    Json(event): Json<CalendarEvent>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    let updated = state
        .calendar
        .update_event(&auth.user.id, kind, &event_id, &event)
        .await?;

    Ok(event_envelope(updated))
}

pub(crate) async fn delete_calendar_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((provider, event_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = parse_provider(&provider)?;
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .calendar
        .delete_event(&auth.user.id, kind, &event_id)
        .await?;

    Ok(Json(MessageResponse::new("Calendar event deleted")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskhive_core::calendar_connection::CalendarConnectionStore;

    use super::*;
    use crate::{
        calendar::{CalendarService, tests::FakeProvider},
        test_support::{bearer_headers, response_json, seed_user, setup_state},
    };

    fn event() -> CalendarEvent {
        CalendarEvent {
            title: "Standup".into(),
            start: "2024-05-06T09:00:00Z".into(),
            end: "2024-05-06T09:15:00Z".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "user@example.com").await;

        let (status, json) = response_json(
            calendar_status_handler(
                State(state.clone()),
                bearer_headers(&state, &user),
                Path("yahoo".into()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(json["name"], "UNSUPPORTED_PROVIDER");
    }

    #[tokio::test]
    async fn status_reports_unconfigured_provider() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "user@example.com").await;

        let (status, json) = response_json(
            calendar_status_handler(
                State(state.clone()),
                bearer_headers(&state, &user),
                Path("google".into()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["configured"], false);
        assert_eq!(json["connected"], false);

        let (status, _) = response_json(
            calendar_auth_url_handler(
                State(state.clone()),
                bearer_headers(&state, &user),
                Path("google".into()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn connect_create_and_disconnect() {
        let (_dir, database, mut state) = setup_state().await;
        state.calendar = Arc::new(
            CalendarService::new(CalendarConnectionStore::new(&database))
                .with_provider(Arc::new(FakeProvider::default())),
        );
        let user = seed_user(&state, "user@example.com").await;
        let headers = bearer_headers(&state, &user);

        let (status, json) = response_json(
            connect_calendar_handler(
                State(state.clone()),
                headers.clone(),
                Path("google".into()),
                Json(ConnectCalendarRequest {
                    code: "code".into(),
                    state: None,
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["connected"], true);
        assert_eq!(json["accountEmail"], "cal@example.com");

        let (status, json) = response_json(
            create_calendar_event_handler(
                State(state.clone()),
                headers.clone(),
                Path("google".into()),
                Json(event()),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);
        let event_id = json["event"]["id"].as_str().expect("id").to_owned();

        let (status, json) = response_json(
            get_calendar_event_handler(
                State(state.clone()),
                headers.clone(),
                Path(("google".into(), event_id.clone())),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["event"]["title"], "Standup");

        let (status, _) = response_json(
            delete_calendar_event_handler(
                State(state.clone()),
                headers.clone(),
                Path(("google".into(), event_id)),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);

        let (status, json) = response_json(
            disconnect_calendar_handler(State(state.clone()), headers, Path("google".into()))
                .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["message"], "google calendar disconnected");
    }
}
