// Router configuration

use axum::{
    Router,
    http::Method,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use taskhive_core::{
    resource::WorkspaceResource,
    resources::{ChecklistInstance, Invoice, Order, Roster, Stocktake, Task, WeeklyTakings},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::expose_error_debug,
    handlers::{
        ai_handlers::*, auth_handlers::*, billing_handlers::*, calendar_handlers::*,
        health_handlers::*, member_handlers::*, resource_handlers::*, user_handlers::*,
        workspace_handlers::*,
    },
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let router = Router::new()
        // Health & Info
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        // Authentication
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler))
        // Users
        .route("/api/users/me", patch(update_profile_handler))
        .route("/api/admin/users", get(list_users_handler))
        .route(
            "/api/admin/users/{user_id}/active",
            put(set_user_active_handler),
        )
        .route("/api/admin/users/{user_id}/role", put(set_user_role_handler))
        .route(
            "/api/admin/users/{user_id}/permissions",
            put(set_user_permissions_handler),
        )
        // Workspaces
        .route(
            "/api/workspaces",
            get(list_workspaces_handler).post(create_workspace_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}",
            get(get_workspace_handler)
                .put(update_workspace_handler)
                .patch(update_workspace_handler)
                .delete(delete_workspace_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/members",
            get(list_members_handler).post(add_member_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/members/{member_id}",
            put(update_member_role_handler).delete(remove_member_handler),
        )
        // Workspace resources
        .merge(resource_routes::<Task>())
        .merge(resource_routes::<ChecklistInstance>())
        .merge(resource_routes::<Order>())
        .merge(resource_routes::<Roster>())
        .merge(resource_routes::<Stocktake>())
        .merge(resource_routes::<Invoice>())
        .merge(resource_routes::<WeeklyTakings>())
        // AI
        .route("/api/ai/extract-tasks", post(extract_tasks_handler))
        .route("/api/ai/prioritize", post(prioritize_handler))
        .route("/api/ai/plan-day", post(plan_day_handler))
        // Calendar
        .route("/api/calendar/{provider}", delete(disconnect_calendar_handler))
        .route(
            "/api/calendar/{provider}/auth-url",
            get(calendar_auth_url_handler),
        )
        .route(
            "/api/calendar/{provider}/connect",
            post(connect_calendar_handler),
        )
        .route("/api/calendar/{provider}/status", get(calendar_status_handler))
        .route(
            "/api/calendar/{provider}/events",
            post(create_calendar_event_handler),
        )
        .route(
            "/api/calendar/{provider}/events/{event_id}",
            get(get_calendar_event_handler)
                .put(update_calendar_event_handler)
                .delete(delete_calendar_event_handler),
        )
        // Billing
        .route("/api/billing/checkout", post(checkout_handler))
        .route("/api/billing/subscription", get(subscription_handler))
        .route("/api/billing/cancel", post(cancel_subscription_handler));

    router
        .layer(from_fn_with_state(state.clone(), expose_error_debug))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::propagate_request_id_layer())
        .layer(observability::request_context_layer())
        .with_state(state)
}

/// Collection and item routes for one resource kind.
fn resource_routes<T: WorkspaceResource>() -> Router<AppState> {
    let collection = format!("/api/workspaces/{{workspace_id}}/{}", T::KIND.plural());
    let item = format!("{collection}/{{id}}");

    Router::new()
        .route(
            &collection,
            get(list_resources_handler::<T>).post(create_resource_handler::<T>),
        )
        .route(
            &item,
            get(get_resource_handler::<T>)
                .put(update_resource_handler::<T>)
                .patch(update_resource_handler::<T>)
                .delete(delete_resource_handler::<T>),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value as JsonValue, json};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{seed_team_workspace, seed_user, setup_state};

    async fn send(
        router: Router,
        request: Request<Body>,
    ) -> (StatusCode, JsonValue, Option<String>) {
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, json, request_id)
    }

    #[tokio::test]
    async fn health_answers_with_request_id() {
        let (_dir, _database, state) = setup_state().await;
        let router = build_router(state);

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .expect("request");
        let (status, json, request_id) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "status": "ok" }));
        assert_eq!(request_id.as_deref(), Some("req-42"));
    }

    #[tokio::test]
    async fn resource_routes_require_a_token() {
        let (_dir, _database, state) = setup_state().await;
        let owner = seed_user(&state, "owner@example.com").await;
        let workspace = seed_team_workspace(&state, &owner, "Kitchen").await;
        let router = build_router(state);

        let request = Request::builder()
            .uri(format!("/api/workspaces/{}/rosters", workspace.id))
            .body(Body::empty())
            .expect("request");
        let (status, json, _) = send(router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn register_then_create_a_task_over_http() {
        let (_dir, _database, state) = setup_state().await;
        let router = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "email": "Chef@Example.com",
                    "password": "correct-horse",
                    "name": "Chef"
                })
                .to_string(),
            ))
            .expect("request");
        let (status, json, _) = send(router.clone(), request).await;
        assert_eq!(status, StatusCode::CREATED);
        let token = json["token"].as_str().expect("token").to_owned();

        let request = Request::builder()
            .uri("/api/workspaces")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");
        let (status, json, _) = send(router.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        let workspace_id = json["workspaces"][0]["id"]
            .as_str()
            .expect("personal workspace")
            .to_owned();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/workspaces/{workspace_id}/tasks"))
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "title": "Prep sauces" }).to_string()))
            .expect("request");
        let (status, json, _) = send(router, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["task"]["title"], "Prep sauces");
        assert_eq!(json["task"]["status"], "todo");
    }
}
