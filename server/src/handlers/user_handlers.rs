// Profile and user administration handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use taskhive_core::user::UserRecord;

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    state::AppState,
    types::{
        ListUsersQuery, SetActiveRequest, SetPermissionsRequest, SetRoleRequest,
        UpdateProfileRequest, UserEnvelope, UserResponse, UsersEnvelope,
    },
};

const DEFAULT_USER_PAGE: i64 = 50;

pub(crate) async fn update_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state
        .user_service
        .update_profile(&auth.user.id, payload.name.as_deref())
        .await?;

    Ok(Json(UserEnvelope {
        success: true,
        user: UserResponse::from(&user),
    }))
}

pub(crate) async fn list_users_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let users = state
        .user_service
        .list_users(
            &auth.user,
            query.offset.unwrap_or(0),
            query.limit.unwrap_or(DEFAULT_USER_PAGE),
        )
        .await?;

    Ok(Json(UsersEnvelope {
        success: true,
        users: users.iter().map(UserResponse::from).collect(),
    }))
}

pub(crate) async fn set_user_active_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state
        .user_service
        .set_active(&auth.user, &user_id, payload.active)
        .await?;
    Ok(user_envelope(&user))
}

pub(crate) async fn set_user_role_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state
        .user_service
        .set_role(&auth.user, &user_id, &payload.role)
        .await?;
    Ok(user_envelope(&user))
}

pub(crate) async fn set_user_permissions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<SetPermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state
        .user_service
        .set_permissions(&auth.user, &user_id, &payload.permissions)
        .await?;
    Ok(user_envelope(&user))
}

fn user_envelope(user: &UserRecord) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        success: true,
        user: UserResponse::from(user),
    })
}

#[cfg(test)]
mod tests {
    use taskhive_core::user::UserRole;

    use super::*;
    use crate::test_support::{bearer_headers, response_json, seed_admin, seed_user, setup_state};

    #[tokio::test]
    async fn profile_update_trims_name() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "cook@example.com").await;

        let (status, json) = response_json(
            update_profile_handler(
                State(state.clone()),
                bearer_headers(&state, &user),
                Json(UpdateProfileRequest {
                    name: Some("  Sous Chef ".into()),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["user"]["name"], "Sous Chef");
    }

    #[tokio::test]
    async fn admin_endpoints_are_gated() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "cook@example.com").await;
        let admin = seed_admin(&state, "boss@example.com", UserRole::Admin).await;

        let (status, _) = response_json(
            list_users_handler(
                State(state.clone()),
                bearer_headers(&state, &user),
                Query(ListUsersQuery {
                    offset: None,
                    limit: None,
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 403);

        let (status, json) = response_json(
            set_user_active_handler(
                State(state.clone()),
                bearer_headers(&state, &admin),
                Path(user.id.to_string()),
                Json(SetActiveRequest { active: false }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(json["user"]["active"], false);

        let (status, json) = response_json(
            set_user_role_handler(
                State(state.clone()),
                bearer_headers(&state, &admin),
                Path(user.id.to_string()),
                Json(SetRoleRequest {
                    role: "superadmin".into(),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(json["success"], false);
    }
}
