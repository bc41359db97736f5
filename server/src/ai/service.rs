use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use taskhive_core::{resource::ResourceRecord, resources::Task};
use tracing::{debug, warn};

use super::{client::GenerativeClient, decode::decode_json};

const EXTRACT_TASKS_PROMPT: &str = "\
You turn notes into actionable tasks.
Return ONLY a JSON array. Each element: {\"title\": string, \"description\": string|null, \
\"priority\": \"low\"|\"medium\"|\"high\"|\"urgent\", \"dueDate\": \"YYYY-MM-DD\"|null, \
\"estimatedMinutes\": number|null}.
Notes:
{input}";

const PRIORITIZE_PROMPT: &str = "\
Rank the following tasks from most to least important.
Return ONLY a JSON array. Each element: {\"id\": string|null, \"title\": string, \
\"priority\": \"low\"|\"medium\"|\"high\"|\"urgent\", \"reason\": string}.
Tasks (JSON):
{input}";

const PLAN_DAY_PROMPT: &str = "\
Build a schedule for {date} between {start} and {end} using the tasks below.
Return ONLY a JSON array of time blocks. Each element: {\"taskId\": string|null, \
\"title\": string, \"start\": \"HH:MM\", \"end\": \"HH:MM\", \"notes\": string|null}.
Tasks (JSON):
{input}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

/// Task shape handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskBrief {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

impl From<&ResourceRecord<Task>> for TaskBrief {
    fn from(record: &ResourceRecord<Task>) -> Self {
        let task = &record.body;
        Self {
            id: Some(record.id.to_string()),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: serde_json::to_value(task.priority)
                .ok()
                .and_then(|value| value.as_str().map(ToOwned::to_owned)),
            due_date: task.due_date.map(|date| date.to_string()),
            estimated_minutes: task.estimated_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRanking {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBlock {
    #[serde(default)]
    pub task_id: Option<String>,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkingHours<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

impl Default for WorkingHours<'_> {
    fn default() -> Self {
        Self {
            start: "09:00",
            end: "17:00",
        }
    }
}

/// Prompt templates over an optional model; every operation degrades to an
/// empty list.
#[derive(Clone, Default)]
pub struct AiService {
    client: Option<Arc<dyn GenerativeClient>>,
}

impl AiService {
    pub fn new(client: Option<Arc<dyn GenerativeClient>>) -> Self {
        Self { client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn extract_tasks(&self, text: &str) -> Vec<SuggestedTask> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let prompt = EXTRACT_TASKS_PROMPT.replace("{input}", text.trim());
        self.run("extract_tasks", &prompt).await
    }

    pub async fn prioritize_tasks(&self, tasks: &[TaskBrief]) -> Vec<TaskRanking> {
        if tasks.is_empty() {
            return Vec::new();
        }
        let Some(input) = encode_tasks(tasks) else {
            return Vec::new();
        };
        let prompt = PRIORITIZE_PROMPT.replace("{input}", &input);
        self.run("prioritize_tasks", &prompt).await
    }

    pub async fn plan_day(
        &self,
        tasks: &[TaskBrief],
        date: NaiveDate,
        hours: WorkingHours<'_>,
    ) -> Vec<ScheduleBlock> {
        if tasks.is_empty() {
            return Vec::new();
        }
        let Some(input) = encode_tasks(tasks) else {
            return Vec::new();
        };
        let prompt = PLAN_DAY_PROMPT
            .replace("{date}", &date.to_string())
            .replace("{start}", hours.start)
            .replace("{end}", hours.end)
            .replace("{input}", &input);
        self.run("plan_day", &prompt).await
    }

    async fn run<T: DeserializeOwned>(&self, operation: &'static str, prompt: &str) -> Vec<T> {
        let Some(client) = self.client.as_ref() else {
            debug!(operation, "ai client not configured");
            return Vec::new();
        };

        let output = match client.generate(prompt).await {
            Ok(output) => output,
            Err(error) => {
                warn!(?error, operation, "ai request failed");
                return Vec::new();
            }
        };

        match decode_json::<Vec<T>>(&output) {
            Ok(items) => items,
            Err(error) => {
                warn!(%error, operation, output_len = output.len(), "ai output could not be decoded");
                Vec::new()
            }
        }
    }
}

fn encode_tasks(tasks: &[TaskBrief]) -> Option<String> {
    serde_json::to_string(tasks)
        .inspect_err(|error| warn!(%error, "failed to encode tasks for prompt"))
        .ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    pub(crate) struct ScriptedClient {
        reply: Result<String, String>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub(crate) fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_owned()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_owned()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedClient {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_owned());
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    fn brief(title: &str) -> TaskBrief {
        TaskBrief {
            id: None,
            title: title.to_owned(),
            description: None,
            priority: None,
            due_date: None,
            estimated_minutes: None,
        }
    }

    #[tokio::test]
    async fn extracts_tasks_from_fenced_reply() {
        let client = ScriptedClient::replying(concat!(
            "Sure!\n```json\n",
            r#"[{"title": "Call supplier", "priority": "high"}, {"title": "Count stock"}]"#,
            "\n```",
        ));
        let service = AiService::new(Some(client.clone()));

        let tasks = service
            .extract_tasks("call the supplier and count stock")
            .await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Call supplier");
        assert_eq!(tasks[0].priority.as_deref(), Some("high"));

        let prompts = client.prompts.lock().await;
        assert!(prompts[0].contains("call the supplier and count stock"));
    }

    #[tokio::test]
    async fn non_json_reply_yields_empty_list() {
        let service = AiService::new(Some(ScriptedClient::replying(
            "I'm sorry, I can't help with that.",
        )));
        assert!(service.extract_tasks("anything").await.is_empty());
    }

    #[tokio::test]
    async fn failures_and_missing_client_yield_empty_lists() {
        let failing = AiService::new(Some(ScriptedClient::failing("timeout")));
        assert!(failing.prioritize_tasks(&[brief("a")]).await.is_empty());

        let disabled = AiService::default();
        assert!(!disabled.is_enabled());
        assert!(disabled.extract_tasks("anything").await.is_empty());
    }

    #[tokio::test]
    async fn plans_day_with_hours_in_prompt() {
        let client = ScriptedClient::replying(
            r#"[{"taskId": "t1", "title": "Prep", "start": "09:00", "end": "10:30"}]"#,
        );
        let service = AiService::new(Some(client.clone()));
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).expect("date");

        let blocks = service
            .plan_day(&[brief("Prep")], date, WorkingHours::default())
            .await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].task_id.as_deref(), Some("t1"));

        let prompts = client.prompts.lock().await;
        assert!(prompts[0].contains("2024-05-06 between 09:00 and 17:00"));
    }

    #[tokio::test]
    async fn empty_inputs_skip_the_model() {
        let client = ScriptedClient::replying("[]");
        let service = AiService::new(Some(client.clone()));
        assert!(service.extract_tasks("   ").await.is_empty());
        assert!(service.prioritize_tasks(&[]).await.is_empty());
        assert!(client.prompts.lock().await.is_empty());
    }
}
