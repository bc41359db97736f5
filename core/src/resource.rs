use std::{fmt, marker::PhantomData, str::FromStr};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    db::{
        Database,
        resource_repo::{ResourceRepositoryRef, ResourceRow},
    },
    ids::{ResourceId, UserId, WorkspaceId},
};

/// Raised when a resource body does not satisfy its kind's rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type Validation = std::result::Result<(), ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Task,
    ChecklistInstance,
    Order,
    Roster,
    Stocktake,
    Invoice,
    WeeklyTakings,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        Self::Task,
        Self::ChecklistInstance,
        Self::Order,
        Self::Roster,
        Self::Stocktake,
        Self::Invoice,
        Self::WeeklyTakings,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::ChecklistInstance => "checklist_instances",
            Self::Order => "orders",
            Self::Roster => "rosters",
            Self::Stocktake => "stocktakes",
            Self::Invoice => "invoices",
            Self::WeeklyTakings => "weekly_takings",
        }
    }

    /// Envelope key for a single item.
    pub fn singular(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::ChecklistInstance => "checklist",
            Self::Order => "order",
            Self::Roster => "roster",
            Self::Stocktake => "stocktake",
            Self::Invoice => "invoice",
            Self::WeeklyTakings => "takings",
        }
    }

    /// Envelope key for a list, also the route segment.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::ChecklistInstance => "checklists",
            Self::Order => "orders",
            Self::Roster => "rosters",
            Self::Stocktake => "stocktakes",
            Self::Invoice => "invoices",
            Self::WeeklyTakings => "takings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::ChecklistInstance => "Checklist",
            Self::Order => "Order",
            Self::Roster => "Roster",
            Self::Stocktake => "Stocktake",
            Self::Invoice => "Invoice",
            Self::WeeklyTakings => "Weekly takings",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

pub trait ResourceStatus:
    Copy
    + Default
    + PartialEq
    + Serialize
    + DeserializeOwned
    + FromStr<Err = ValidationError>
    + Send
    + Sync
    + 'static
{
    fn as_str(self) -> &'static str;
}

/// Declares a status enum whose wire form is the given string literal.
macro_rules! resource_status {
    ($(#[$meta:meta])* $name:ident { default: $default:ident, $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl $crate::resource::ResourceStatus for $name {
            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::resource::ValidationError;

            fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err($crate::resource::ValidationError::new(format!(
                        "unknown status: {other}"
                    ))),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::resource::ResourceStatus::as_str(*self))
            }
        }
    };
}

pub(crate) use resource_status;

/// A typed resource body stored as JSON in its kind's table.
pub trait WorkspaceResource:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    const KIND: ResourceKind;

    type Status: ResourceStatus;

    fn status(&self) -> Self::Status;

    fn validate(&self) -> Validation;

    /// The assignee mirrored into the indexed `assigned_to` column.
    fn assigned_to(&self) -> Option<&str> {
        None
    }

    /// Every user id this body points at; each must be able to see the workspace.
    fn referenced_users(&self) -> Vec<&str> {
        self.assigned_to().into_iter().collect()
    }

    /// Values computed from the body and emitted next to it, never stored.
    fn derived(&self) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceRecord<T> {
    pub id: ResourceId,
    pub workspace_id: WorkspaceId,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
    pub body: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView<'a, T> {
    id: &'a ResourceId,
    workspace_id: &'a WorkspaceId,
    created_by: &'a UserId,
    created_at: i64,
    updated_at: i64,
    #[serde(flatten)]
    body: &'a T,
    #[serde(flatten)]
    derived: Map<String, Value>,
}

impl<T: WorkspaceResource> Serialize for ResourceRecord<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        RecordView {
            id: &self.id,
            workspace_id: &self.workspace_id,
            created_by: &self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            body: &self.body,
            derived: self.body.derived(),
        }
        .serialize(serializer)
    }
}

impl<T: WorkspaceResource> ResourceRecord<T> {
    fn from_row(row: ResourceRow) -> Result<Self> {
        let body = serde_json::from_value(row.body).with_context(|| {
            format!("stored {} {} has an unreadable body", T::KIND, row.id)
        })?;
        Ok(Self {
            id: ResourceId::from(row.id),
            workspace_id: WorkspaceId::from(row.workspace_id),
            created_by: UserId::from(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
            body,
        })
    }

    fn to_row(&self) -> Result<ResourceRow> {
        Ok(ResourceRow {
            id: self.id.to_string(),
            workspace_id: self.workspace_id.to_string(),
            status: self.body.status().as_str().to_owned(),
            assigned_to: self.body.assigned_to().map(ToOwned::to_owned),
            body: serde_json::to_value(&self.body)?,
            created_by: self.created_by.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Decode a request body into `T` and run its rules.
pub fn decode_body<T: WorkspaceResource>(value: Value) -> std::result::Result<T, ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::new(format!(
            "{} payload must be a JSON object",
            T::KIND.label()
        )));
    }
    let body: T = serde_json::from_value(value)
        .map_err(|err| ValidationError::new(format!("invalid {}: {err}", T::KIND)))?;
    body.validate()?;
    Ok(body)
}

/// Overlay the top-level keys of `patch` on `current` and re-validate.
pub fn merge_patch<T: WorkspaceResource>(
    current: &T,
    patch: Value,
) -> std::result::Result<T, ValidationError> {
    let Value::Object(patch) = patch else {
        return Err(ValidationError::new(format!(
            "{} update must be a JSON object",
            T::KIND.label()
        )));
    };

    let mut merged = serde_json::to_value(current)
        .map_err(|err| ValidationError::new(format!("invalid {}: {err}", T::KIND)))?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in patch {
            fields.insert(key, value);
        }
    }

    decode_body(merged)
}

#[derive(Clone)]
pub struct ResourceStore<T> {
    resource_repo: ResourceRepositoryRef,
    _kind: PhantomData<fn() -> T>,
}

impl<T: WorkspaceResource> ResourceStore<T> {
    pub fn new(database: &Database) -> Self {
        Self {
            resource_repo: database.repositories().resource_repo(),
            _kind: PhantomData,
        }
    }

    pub async fn list(
        &self,
        workspace_id: &str,
        status: Option<T::Status>,
    ) -> Result<Vec<ResourceRecord<T>>> {
        let rows = self
            .resource_repo
            .list(T::KIND, workspace_id, status.map(ResourceStatus::as_str))
            .await?;
        rows.into_iter().map(ResourceRecord::from_row).collect()
    }

    pub async fn get(&self, workspace_id: &str, id: &str) -> Result<Option<ResourceRecord<T>>> {
        self.resource_repo
            .fetch(T::KIND, workspace_id, id)
            .await?
            .map(ResourceRecord::from_row)
            .transpose()
    }

    /// Persist a body that has already passed [`decode_body`].
    pub async fn create(
        &self,
        workspace_id: &str,
        created_by: &str,
        body: T,
    ) -> Result<ResourceRecord<T>> {
        body.validate()?;
        let now = Utc::now().timestamp();
        let record = ResourceRecord {
            id: ResourceId::generate(),
            workspace_id: WorkspaceId::from(workspace_id),
            created_by: UserId::from(created_by),
            created_at: now,
            updated_at: now,
            body,
        };
        self.resource_repo.insert(T::KIND, record.to_row()?).await?;
        debug!(kind = %T::KIND, id = %record.id, workspace_id, "resource created");
        Ok(record)
    }

    /// Replace the stored body; `None` when the row vanished meanwhile.
    pub async fn replace(
        &self,
        current: ResourceRecord<T>,
        body: T,
    ) -> Result<Option<ResourceRecord<T>>> {
        body.validate()?;
        let record = ResourceRecord {
            updated_at: Utc::now().timestamp(),
            body,
            ..current
        };
        let updated = self.resource_repo.update(T::KIND, record.to_row()?).await?;
        Ok(updated.then_some(record))
    }

    pub async fn delete(&self, workspace_id: &str, id: &str) -> Result<bool> {
        self.resource_repo.delete(T::KIND, workspace_id, id).await
    }
}

pub(crate) fn non_blank(value: &str, field: &str) -> Validation {
    if value.trim().is_empty() {
        Err(ValidationError::new(format!("{field} is required")))
    } else {
        Ok(())
    }
}

pub(crate) fn non_negative(value: f64, field: &str) -> Validation {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "{field} must be a non-negative number"
        )))
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
