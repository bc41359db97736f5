use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::{
    db::{
        Database,
        subscription_repo::{SubscriptionRepositoryRef, UpsertSubscription},
    },
    ids::UserId,
};

/// Local mirror of the billing provider's subscription state for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub status: String,
    pub plan: Option<String>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub updated_at: i64,
}

impl SubscriptionRecord {
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub status: String,
    pub plan: Option<String>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

#[derive(Clone)]
pub struct SubscriptionStore {
    repo: SubscriptionRepositoryRef,
}

impl SubscriptionStore {
    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().subscription_repo(),
        }
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        self.repo.fetch(user_id).await
    }

    /// Record the latest known state. Identifiers that are `None` keep their
    /// stored values.
    pub async fn save(
        &self,
        user_id: &str,
        update: SubscriptionUpdate,
    ) -> Result<SubscriptionRecord> {
        self.repo
            .upsert(UpsertSubscription {
                user_id: user_id.to_owned(),
                update,
                now: Utc::now().timestamp(),
            })
            .await
    }
}
