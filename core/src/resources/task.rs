use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    ids::UserId,
    resource::{
        ResourceKind, Validation, ValidationError, WorkspaceResource, non_blank, resource_status,
    },
};

const MAX_TAGS: usize = 20;

resource_status!(TaskStatus {
    default: Todo,
    Todo => "todo",
    InProgress => "in_progress",
    Done => "done",
    Cancelled => "cancelled",
});

impl TaskStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

impl WorkspaceResource for Task {
    const KIND: ResourceKind = ResourceKind::Task;

    type Status = TaskStatus;

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        non_blank(&self.title, "title")?;
        if self.tags.len() > MAX_TAGS {
            return Err(ValidationError::new(format!(
                "a task can carry at most {MAX_TAGS} tags"
            )));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ValidationError::new("tags must not be blank"));
        }
        if self.estimated_minutes == Some(0) {
            return Err(ValidationError::new(
                "estimatedMinutes must be greater than zero",
            ));
        }
        Ok(())
    }

    fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }
}
