// Request and response types for REST API handlers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use taskhive_core::{
    access::AccessLevel,
    calendar_connection::CalendarConnection,
    membership::MemberWithUser,
    subscription::SubscriptionRecord,
    user::{UserRecord, UserRole},
    workspace::{WorkspaceKind, WorkspaceRecord},
};

use crate::{ai::TaskBrief, calendar::CalendarEvent};

// ========== Authentication Types ==========

#[derive(Debug, Clone)]
pub(crate) struct AuthenticatedRestSession {
    pub(crate) user: UserRecord,
}

// ========== Request Types ==========

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) email: String,
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateProfileRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListUsersQuery {
    #[serde(default)]
    pub(crate) offset: Option<i64>,
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetActiveRequest {
    pub(crate) active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetRoleRequest {
    pub(crate) role: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetPermissionsRequest {
    pub(crate) permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateWorkspaceRequest {
    pub(crate) name: String,
    #[serde(default, alias = "type")]
    pub(crate) kind: Option<WorkspaceKind>,
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) icon: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateWorkspaceRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// An empty string clears the field.
    #[serde(default)]
    pub(crate) color: Option<String>,
    #[serde(default)]
    pub(crate) icon: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddMemberRequest {
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateMemberRoleRequest {
    pub(crate) role: String,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct StatusFilter {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectCalendarRequest {
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractTasksRequest {
    pub(crate) text: String,
}

/// Tasks come inline or, with `workspaceId`, from that workspace's open tasks.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrioritizeRequest {
    #[serde(default)]
    pub(crate) workspace_id: Option<String>,
    #[serde(default)]
    pub(crate) tasks: Vec<TaskBrief>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanDayRequest {
    #[serde(default)]
    pub(crate) workspace_id: Option<String>,
    #[serde(default)]
    pub(crate) tasks: Vec<TaskBrief>,
    #[serde(default)]
    pub(crate) date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) start: Option<String>,
    #[serde(default)]
    pub(crate) end: Option<String>,
}

// ========== Response Types ==========

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) role: UserRole,
    pub(crate) active: bool,
    pub(crate) permissions: Vec<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            active: user.active,
            permissions: user.permissions.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    pub(crate) success: bool,
    pub(crate) token: String,
    pub(crate) user: UserResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserEnvelope {
    pub(crate) success: bool,
    pub(crate) user: UserResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsersEnvelope {
    pub(crate) success: bool,
    pub(crate) users: Vec<UserResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceResponse {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) kind: WorkspaceKind,
    pub(crate) color: Option<String>,
    pub(crate) icon: Option<String>,
    pub(crate) description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) access_level: Option<&'static str>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl WorkspaceResponse {
    pub(crate) fn new(workspace: &WorkspaceRecord, level: Option<AccessLevel>) -> Self {
        Self {
            id: workspace.id.to_string(),
            owner_id: workspace.owner_id.to_string(),
            name: workspace.name.clone(),
            kind: workspace.kind,
            color: workspace.color.clone(),
            icon: workspace.icon.clone(),
            description: workspace.description.clone(),
            access_level: level.map(AccessLevel::as_str),
            created_at: workspace.created_at,
            updated_at: workspace.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkspaceEnvelope {
    pub(crate) success: bool,
    pub(crate) workspace: WorkspaceResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkspacesEnvelope {
    pub(crate) success: bool,
    pub(crate) workspaces: Vec<WorkspaceResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberResponse {
    pub(crate) user_id: String,
    pub(crate) email: String,
    pub(crate) name: Option<String>,
    pub(crate) role: String,
    pub(crate) active: bool,
    pub(crate) joined_at: i64,
    pub(crate) invited_by: Option<String>,
}

impl From<MemberWithUser> for MemberResponse {
    fn from(member: MemberWithUser) -> Self {
        Self {
            user_id: member.user_id.into_inner(),
            email: member.email,
            name: member.name,
            role: member.role,
            active: member.active,
            joined_at: member.joined_at,
            invited_by: member.invited_by.map(|id| id.into_inner()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MembersEnvelope {
    pub(crate) success: bool,
    pub(crate) members: Vec<MemberResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberEnvelope {
    pub(crate) success: bool,
    pub(crate) member: MemberResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
}

impl MessageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalendarStatusResponse {
    pub(crate) success: bool,
    pub(crate) provider: &'static str,
    pub(crate) configured: bool,
    pub(crate) connected: bool,
    pub(crate) account_email: Option<String>,
    pub(crate) expires_at: Option<i64>,
}

impl CalendarStatusResponse {
    pub(crate) fn new(
        provider: &'static str,
        configured: bool,
        connection: Option<&CalendarConnection>,
    ) -> Self {
        Self {
            success: true,
            provider,
            configured,
            connected: connection.is_some(),
            account_email: connection.and_then(|conn| conn.account_email.clone()),
            expires_at: connection.and_then(|conn| conn.expires_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthUrlResponse {
    pub(crate) success: bool,
    pub(crate) url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CalendarEventEnvelope {
    pub(crate) success: bool,
    pub(crate) event: CalendarEvent,
}

#[derive(Debug, Serialize)]
pub(crate) struct SuggestionsEnvelope<T> {
    pub(crate) success: bool,
    pub(crate) suggestions: Vec<T>,
}

impl<T> SuggestionsEnvelope<T> {
    pub(crate) fn new(suggestions: Vec<T>) -> Self {
        Self {
            success: true,
            suggestions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutResponse {
    pub(crate) success: bool,
    pub(crate) session_id: String,
    pub(crate) url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubscriptionEnvelope {
    pub(crate) success: bool,
    pub(crate) subscription: Option<SubscriptionRecord>,
}
