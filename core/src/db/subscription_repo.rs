use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::subscription::{SubscriptionRecord, SubscriptionUpdate};

#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub user_id: String,
    pub update: SubscriptionUpdate,
    pub now: i64,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn upsert(&self, params: UpsertSubscription) -> Result<SubscriptionRecord>;

    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;
}

pub type SubscriptionRepositoryRef = Arc<dyn SubscriptionRepository>;
