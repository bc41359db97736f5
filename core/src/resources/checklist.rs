use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    ids::UserId,
    resource::{
        ResourceKind, Validation, ValidationError, WorkspaceResource, non_blank, resource_status,
    },
};

resource_status!(ChecklistStatus {
    default: Pending,
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub label: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One run of a checklist template (opening, closing, cleaning...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistInstance {
    #[serde(default)]
    pub template_name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub status: ChecklistStatus,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl ChecklistInstance {
    pub fn completed_items(&self) -> usize {
        self.items.iter().filter(|item| item.done).count()
    }

    /// Whole-number percentage of ticked items; an empty list counts as 0.
    pub fn progress_percent(&self) -> u32 {
        if self.items.is_empty() {
            return 0;
        }
        ((self.completed_items() * 100) / self.items.len()) as u32
    }
}

impl WorkspaceResource for ChecklistInstance {
    const KIND: ResourceKind = ResourceKind::ChecklistInstance;

    type Status = ChecklistStatus;

    fn status(&self) -> ChecklistStatus {
        self.status
    }

    fn validate(&self) -> Validation {
        non_blank(&self.title, "title")?;
        for item in &self.items {
            non_blank(&item.label, "item label")?;
        }
        if self.status == ChecklistStatus::Completed && self.completed_items() < self.items.len() {
            return Err(ValidationError::new(
                "a checklist can only be completed once every item is done",
            ));
        }
        Ok(())
    }

    fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    fn derived(&self) -> Map<String, Value> {
        let mut derived = Map::new();
        derived.insert(
            "progress".to_owned(),
            json!({
                "completed": self.completed_items(),
                "total": self.items.len(),
                "percent": self.progress_percent(),
            }),
        );
        derived
    }
}
