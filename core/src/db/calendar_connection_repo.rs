use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::calendar_connection::{CalendarConnection, CalendarProviderKind};

#[derive(Debug, Clone)]
pub struct UpsertCalendarConnection {
    pub user_id: String,
    pub provider: CalendarProviderKind,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub account_email: Option<String>,
    pub now: i64,
}

#[async_trait]
pub trait CalendarConnectionRepository: Send + Sync {
    async fn upsert(&self, params: UpsertCalendarConnection) -> Result<CalendarConnection>;

    async fn fetch(
        &self,
        user_id: &str,
        provider: CalendarProviderKind,
    ) -> Result<Option<CalendarConnection>>;

    async fn delete(&self, user_id: &str, provider: CalendarProviderKind) -> Result<bool>;
}

pub type CalendarConnectionRepositoryRef = Arc<dyn CalendarConnectionRepository>;
