// Authentication and authorization logic

use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use taskhive_core::access::{AccessDecision, WorkspaceAccess};

use crate::{error::AppError, state::AppState, types::AuthenticatedRestSession};

/// Extract the token from `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub(crate) async fn authenticate_rest_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedRestSession, AppError> {
    state
        .user_service
        .authenticate_rest_request(headers)
        .await
}

/// Authenticate the caller and resolve their access to `workspace_id`.
pub(crate) async fn resolve_workspace_access(
    state: &AppState,
    headers: &HeaderMap,
    workspace_id: &str,
) -> Result<(AuthenticatedRestSession, WorkspaceAccess), AppError> {
    let auth = authenticate_rest_request(state, headers).await?;
    let access = require_workspace_access(state, &auth.user.id, workspace_id).await?;
    Ok((auth, access))
}

pub(crate) async fn require_workspace_access(
    state: &AppState,
    user_id: &str,
    workspace_id: &str,
) -> Result<WorkspaceAccess, AppError> {
    let decision = state
        .access_resolver
        .resolve(user_id, workspace_id)
        .await
        .map_err(AppError::from_anyhow)?;

    match decision {
        AccessDecision::NotFound => Err(AppError::workspace_not_found(workspace_id)),
        AccessDecision::Denied => Err(AppError::workspace_access_denied(workspace_id)),
        AccessDecision::Granted(access) => Ok(access),
    }
}

pub fn generate_password_hash(password: &str) -> Result<String, PasswordHashError> {
    let mut rng = OsRng;
    let salt = SaltString::generate(&mut rng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(password_hash: &str, password: &str) -> bool {
    if password_hash.trim().is_empty() {
        return false;
    }
    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
