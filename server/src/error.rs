use std::fmt;

use anyhow::Error as AnyError;
use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use taskhive_core::resource::ValidationError;
use tracing::error;

use crate::AppState;

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const BAD_REQUEST_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "BAD_REQUEST",
    error_type: "BAD_REQUEST",
    default_message: "Bad request.",
};

const UNAUTHORIZED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::UNAUTHORIZED,
    name: "AUTHENTICATION_REQUIRED",
    error_type: "AUTHENTICATION_REQUIRED",
    default_message: "You must sign in first to access this resource.",
};

const FORBIDDEN_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    name: "ACTION_FORBIDDEN",
    error_type: "ACTION_FORBIDDEN",
    default_message: "Action forbidden.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_ALREADY_EXISTS",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "Resource already exists.",
};

const INVALID_OPERATION_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "INVALID_OPERATION",
    error_type: "INVALID_OPERATION",
    default_message: "This operation is not allowed.",
};

const BAD_GATEWAY_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_GATEWAY,
    name: "INTEGRATION_ERROR",
    error_type: "INTEGRATION_ERROR",
    default_message: "An upstream service failed.",
};

const UNAVAILABLE_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::SERVICE_UNAVAILABLE,
    name: "DEPENDENCY_UNAVAILABLE",
    error_type: "DEPENDENCY_UNAVAILABLE",
    default_message: "A required service is not available.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

/// Error chain carried on the response so development builds can expose it.
#[derive(Debug, Clone)]
pub(crate) struct ErrorDebug(pub(crate) String);

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::from_descriptor(&FORBIDDEN_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Self::from_descriptor(&INVALID_OPERATION_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn dependency_unavailable(dependency: &str) -> Self {
        Self::from_descriptor(
            &UNAVAILABLE_DESCRIPTOR,
            Some(format!("{dependency} is not configured.")),
        )
        .with_data(json!({ "dependency": dependency }))
    }

    pub(crate) fn integration(service: &str, error: AnyError) -> Self {
        error!(?error, service, "integration call failed");
        Self::from_descriptor(
            &BAD_GATEWAY_DESCRIPTOR,
            Some(format!("{service} request failed.")),
        )
        .with_data(json!({ "service": service }))
        .with_source(error)
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        error!(?error, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        Self::internal(error)
    }

    pub(crate) fn workspace_not_found(workspace_id: &str) -> Self {
        Self::from_descriptor(
            &NOT_FOUND_DESCRIPTOR,
            Some(format!("Workspace {workspace_id} not found.")),
        )
        .with_name("WORKSPACE_NOT_FOUND")
        .with_data(json!({ "workspaceId": workspace_id }))
    }

    pub(crate) fn workspace_access_denied(workspace_id: &str) -> Self {
        Self::from_descriptor(
            &FORBIDDEN_DESCRIPTOR,
            Some(format!(
                "You do not have permission to access workspace {workspace_id}."
            )),
        )
        .with_name("WORKSPACE_ACCESS_DENIED")
        .with_error_type("NO_PERMISSION")
        .with_data(json!({ "workspaceId": workspace_id }))
    }

    pub(crate) fn member_not_found(workspace_id: &str, user_id: &str) -> Self {
        Self::from_descriptor(
            &NOT_FOUND_DESCRIPTOR,
            Some("Member not found in this workspace.".to_owned()),
        )
        .with_name("MEMBER_NOT_FOUND")
        .with_data(json!({ "workspaceId": workspace_id, "memberId": user_id }))
    }

    pub(crate) fn user_not_found(message: impl Into<String>) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(message.into()))
            .with_name("USER_NOT_FOUND")
    }

    pub(crate) fn resource_not_found(label: &str, id: &str) -> Self {
        Self::from_descriptor(&NOT_FOUND_DESCRIPTOR, Some(format!("{label} not found.")))
            .with_name("RESOURCE_NOT_FOUND")
            .with_data(json!({ "id": id }))
    }

    pub(crate) fn already_a_member(email: &str) -> Self {
        Self::from_descriptor(
            &CONFLICT_DESCRIPTOR,
            Some("User is already a member of this workspace.".to_owned()),
        )
        .with_name("ALREADY_A_MEMBER")
        .with_data(json!({ "email": email }))
    }

    pub(crate) fn last_owner() -> Self {
        Self::invalid_operation("Cannot remove the last owner").with_name("LAST_OWNER")
    }

    pub fn status(&self) -> StatusCode {
        self.descriptor.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload, Option<String>) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            success: false,
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            message,
            data,
            debug: None,
        };

        (status, payload, source.map(|error| format!("{error:?}")))
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        Self::bad_request(error.message()).with_name("VALIDATION_ERROR")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload, debug) = self.into_payload();
        let mut response = (status, Json(payload)).into_response();
        if let Some(debug) = debug {
            response.extensions_mut().insert(ErrorDebug(debug));
        }
        response
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) success: bool,
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) debug: Option<String>,
}

/// Copies the error chain into the body when running in development mode.
pub(crate) async fn expose_error_debug(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.is_development() {
        return response;
    }

    let Some(ErrorDebug(debug)) = response.extensions().get::<ErrorDebug>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let Ok(mut payload) = serde_json::from_slice::<JsonValue>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    if let Some(object) = payload.as_object_mut() {
        object.insert("debug".to_owned(), JsonValue::String(debug));
    }
    let body = serde_json::to_vec(&payload)
        .map(Body::from)
        .unwrap_or_else(|_| Body::from(bytes));
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, body)
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn http_error_payload_matches_contract() {
        let response = AppError::bad_request("email must not be empty").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;

        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 400);
        assert_eq!(json["code"], "BAD_REQUEST");
        assert_eq!(json["reason"], "Bad Request");
        assert_eq!(json["type"], "BAD_REQUEST");
        assert_eq!(json["name"], "BAD_REQUEST");
        assert_eq!(json["message"], "email must not be empty");
        assert!(json.get("data").is_none());
        assert!(json.get("debug").is_none());
    }

    #[tokio::test]
    async fn last_owner_is_an_invalid_operation() {
        let response = AppError::last_owner().into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["type"], "INVALID_OPERATION");
        assert_eq!(json["name"], "LAST_OWNER");
        assert_eq!(json["message"], "Cannot remove the last owner");
    }

    #[tokio::test]
    async fn workspace_access_denied_uses_forbidden_contract() {
        let response = AppError::workspace_access_denied("ws-abc").into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["code"], "FORBIDDEN");
        assert_eq!(json["type"], "NO_PERMISSION");
        assert_eq!(json["name"], "WORKSPACE_ACCESS_DENIED");
        assert_eq!(json["data"]["workspaceId"], "ws-abc");
    }

    #[tokio::test]
    async fn internal_errors_hide_the_cause_but_keep_it_for_debugging() {
        let response = AppError::internal(anyhow!("disk on fire")).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let debug = response
            .extensions()
            .get::<ErrorDebug>()
            .cloned()
            .expect("debug extension");
        assert!(debug.0.contains("disk on fire"));

        let json = body_json(response).await;
        assert_eq!(json["message"], "An internal error occurred.");
        assert!(json.get("debug").is_none());
    }

    #[tokio::test]
    async fn integration_and_unavailable_statuses() {
        assert_eq!(
            AppError::integration("google calendar", anyhow!("boom")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::dependency_unavailable("billing").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
