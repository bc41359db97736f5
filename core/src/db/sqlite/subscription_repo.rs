use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::subscription_repo::{SubscriptionRepository, UpsertSubscription},
    ids::UserId,
    subscription::SubscriptionRecord,
};

const SUBSCRIPTION_COLUMNS: &str = "user_id, customer_id, subscription_id, checkout_session_id, \
     status, plan, current_period_end, cancel_at_period_end, updated_at";

pub struct SqliteSubscriptionRepository {
    pool: Pool<Sqlite>,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> SubscriptionRecord {
        SubscriptionRecord {
            user_id: UserId::from(row.get::<String, _>("user_id")),
            customer_id: row.get("customer_id"),
            subscription_id: row.get("subscription_id"),
            checkout_session_id: row.get("checkout_session_id"),
            status: row.get("status"),
            plan: row.get("plan"),
            current_period_end: row.get("current_period_end"),
            cancel_at_period_end: row.get::<i64, _>("cancel_at_period_end") != 0,
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn upsert(&self, params: UpsertSubscription) -> Result<SubscriptionRecord> {
        let UpsertSubscription {
            user_id,
            update,
            now,
        } = params;

        let row = sqlx::query(&format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 customer_id = COALESCE(excluded.customer_id, subscriptions.customer_id),
                 subscription_id = COALESCE(excluded.subscription_id, subscriptions.subscription_id),
                 checkout_session_id = COALESCE(excluded.checkout_session_id, subscriptions.checkout_session_id),
                 status = excluded.status,
                 plan = COALESCE(excluded.plan, subscriptions.plan),
                 current_period_end = COALESCE(excluded.current_period_end, subscriptions.current_period_end),
                 cancel_at_period_end = excluded.cancel_at_period_end,
                 updated_at = excluded.updated_at
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(&user_id)
        .bind(update.customer_id.as_deref())
        .bind(update.subscription_id.as_deref())
        .bind(update.checkout_session_id.as_deref())
        .bind(&update.status)
        .bind(update.plan.as_deref())
        .bind(update.current_period_end)
        .bind(if update.cancel_at_period_end { 1_i64 } else { 0_i64 })
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to store subscription")?;

        Ok(Self::map_row(row))
    }

    async fn fetch(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_row))
    }
}
