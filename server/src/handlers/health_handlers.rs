// Health check and info endpoints

use axum::{Json, extract::State, response::IntoResponse};

use crate::{state::AppState, types::HealthResponse};

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metadata.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{response_json, setup_state};

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, json) = response_json(health_handler().await).await;
        assert_eq!(status, 200);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn info_reports_name_and_version() {
        let (_dir, _database, state) = setup_state().await;
        let (status, json) = response_json(info_handler(State(state)).await).await;
        assert_eq!(status, 200);
        assert_eq!(json["name"], "taskhive");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
