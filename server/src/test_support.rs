#![allow(dead_code)]

use axum::{
    body::to_bytes,
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;
use taskhive_core::{
    config::AppConfig,
    db::Database,
    user::{UserRecord, UserRole},
    workspace::{DEFAULT_PERSONAL_WORKSPACE_NAME, NewWorkspace, WorkspaceKind, WorkspaceRecord},
};
use tempfile::TempDir;

use crate::state::{AppState, build_state};

/// Never a valid PHC string, so password login fails for seeded users.
const SEEDED_PASSWORD_HASH: &str = "seeded-without-password";

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    setup_state_with(|_| {}).await
}

pub(crate) async fn setup_state_with(
    configure: impl FnOnce(&mut AppConfig),
) -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let mut config = AppConfig {
        jwt_secret: "test-secret".to_owned(),
        ..AppConfig::default()
    };
    config.database_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .into_owned();
    configure(&mut config);

    let database = Database::connect(&config).await.expect("connect database");
    let state = build_state(&database, &config).expect("build state");

    (temp_dir, database, state)
}

pub(crate) async fn seed_user(state: &AppState, email: &str) -> UserRecord {
    state
        .user_store
        .create(email, SEEDED_PASSWORD_HASH, None, UserRole::User)
        .await
        .expect("create user")
}

pub(crate) async fn seed_admin(state: &AppState, email: &str, role: UserRole) -> UserRecord {
    state
        .user_store
        .create(email, SEEDED_PASSWORD_HASH, None, role)
        .await
        .expect("create admin")
}

pub(crate) fn bearer_headers(state: &AppState, user: &UserRecord) -> HeaderMap {
    let token = state.token_signer.issue(user).expect("issue token");
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
    );
    headers
}

pub(crate) async fn seed_team_workspace(
    state: &AppState,
    owner: &UserRecord,
    name: &str,
) -> WorkspaceRecord {
    state
        .workspace_store
        .create(
            &owner.id,
            WorkspaceKind::Team,
            NewWorkspace {
                name,
                ..NewWorkspace::default()
            },
        )
        .await
        .expect("create team workspace")
}

pub(crate) async fn seed_personal_workspace(
    state: &AppState,
    owner: &UserRecord,
) -> WorkspaceRecord {
    state
        .workspace_store
        .create(
            &owner.id,
            WorkspaceKind::Personal,
            NewWorkspace {
                name: DEFAULT_PERSONAL_WORKSPACE_NAME,
                ..NewWorkspace::default()
            },
        )
        .await
        .expect("create personal workspace")
}

/// Status plus decoded JSON body of a handler result.
pub(crate) async fn response_json(response: impl IntoResponse) -> (u16, JsonValue) {
    let response: Response = response.into_response();
    let status = response.status().as_u16();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
