// Registration, login and current-user handlers

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    state::AppState,
    types::{AuthResponse, LoginRequest, RegisterRequest, UserEnvelope, UserResponse},
    user::service::IssuedSession,
};

pub(crate) async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .user_service
        .register(&payload.email, &payload.password, payload.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(auth_response(session))))
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .user_service
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(auth_response(session)))
}

pub(crate) async fn me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    Ok(Json(UserEnvelope {
        success: true,
        user: UserResponse::from(&auth.user),
    }))
}

fn auth_response(session: IssuedSession) -> AuthResponse {
    AuthResponse {
        success: true,
        token: session.token,
        user: UserResponse::from(&session.user),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    use super::*;
    use crate::test_support::{response_json, setup_state};

    #[tokio::test]
    async fn register_then_login_and_fetch_me() {
        let (_dir, _database, state) = setup_state().await;

        let (status, json) = response_json(
            register_handler(
                State(state.clone()),
                Json(RegisterRequest {
                    email: "Chef@Example.com".into(),
                    password: "long-enough".into(),
                    name: Some("Chef".into()),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["email"], "chef@example.com");
        assert_eq!(json["user"]["role"], "user");
        assert!(json["user"].get("passwordHash").is_none());

        let (status, json) = response_json(
            login_handler(
                State(state.clone()),
                Json(LoginRequest {
                    email: "chef@example.com".into(),
                    password: "long-enough".into(),
                }),
            )
            .await,
        )
        .await;
        assert_eq!(status, 200);
        let token = json["token"].as_str().expect("token").to_owned();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        let (status, json) = response_json(me_handler(State(state), headers).await).await;
        assert_eq!(status, 200);
        assert_eq!(json["user"]["name"], "Chef");
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let (_dir, _database, state) = setup_state().await;
        let (status, json) = response_json(me_handler(State(state), HeaderMap::new()).await).await;
        assert_eq!(status, 401);
        assert_eq!(json["success"], false);
    }
}
