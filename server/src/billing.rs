//! Subscription billing against a Stripe-style API.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use taskhive_core::{
    config::BillingConfig,
    subscription::{SubscriptionRecord, SubscriptionStore, SubscriptionUpdate},
};
use tracing::info;

use crate::AppError;

const BILLING_SERVICE: &str = "billing";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionItem {
    pub price: SubscriptionPrice,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionPrice {
    pub id: String,
}

impl RemoteSubscription {
    pub fn plan(&self) -> Option<&str> {
        self.items
            .as_ref()?
            .data
            .first()
            .map(|item| item.price.id.as_str())
    }

    pub(crate) fn to_update(&self) -> SubscriptionUpdate {
        SubscriptionUpdate {
            customer_id: self.customer.clone(),
            subscription_id: Some(self.id.clone()),
            checkout_session_id: None,
            status: self.status.clone(),
            plan: self.plan().map(ToOwned::to_owned),
            current_period_end: self.current_period_end,
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

#[async_trait]
pub trait BillingClient: Send + Sync {
    async fn create_checkout_session(
        &self,
        customer_email: &str,
        user_id: &str,
    ) -> Result<CheckoutSession>;

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession>;

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<RemoteSubscription>;

    /// Cancels at the end of the paid period.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<RemoteSubscription>;
}

/// Form-encoded client authenticated with the secret key.
pub struct StripeClient {
    client: Client,
    config: BillingConfig,
}

impl StripeClient {
    pub fn new(client: Client, config: BillingConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn checkout_form<'a>(
        &'a self,
        customer_email: &'a str,
        user_id: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        vec![
            ("mode", "subscription"),
            ("line_items[0][price]", self.config.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.config.success_url.as_str()),
            ("cancel_url", self.config.cancel_url.as_str()),
            ("customer_email", customer_email),
            ("client_reference_id", user_id),
            ("metadata[user_id]", user_id),
        ]
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_owned());
            return Err(anyhow!("billing api error {status} on {what}: {body}"));
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("decode billing {what}"))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<T> {
        let body = serde_urlencoded::to_string(form).context("encode billing form")?;
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .with_context(|| format!("request billing {what}"))?;
        Self::decode(response, what).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .with_context(|| format!("request billing {what}"))?;
        Self::decode(response, what).await
    }
}

#[async_trait]
impl BillingClient for StripeClient {
    async fn create_checkout_session(
        &self,
        customer_email: &str,
        user_id: &str,
    ) -> Result<CheckoutSession> {
        let form = self.checkout_form(customer_email, user_id);
        self.post_form("checkout/sessions", &form, "checkout session")
            .await
    }

    async fn fetch_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        self.get(&format!("checkout/sessions/{session_id}"), "checkout session")
            .await
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<RemoteSubscription> {
        self.get(&format!("subscriptions/{subscription_id}"), "subscription")
            .await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<RemoteSubscription> {
        self.post_form(
            &format!("subscriptions/{subscription_id}"),
            &[("cancel_at_period_end", "true")],
            "subscription cancel",
        )
        .await
    }
}

/// Keeps the local subscription mirror in step with the billing provider.
#[derive(Clone)]
pub struct BillingService {
    client: Option<Arc<dyn BillingClient>>,
    subscriptions: SubscriptionStore,
}

impl BillingService {
    pub fn new(client: Option<Arc<dyn BillingClient>>, subscriptions: SubscriptionStore) -> Self {
        Self {
            client,
            subscriptions,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Arc<dyn BillingClient>, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::dependency_unavailable(BILLING_SERVICE))
    }

    pub async fn start_checkout(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<CheckoutSession, AppError> {
        let client = self.client()?;

        let existing = self
            .subscriptions
            .find(user_id)
            .await
            .map_err(AppError::from_anyhow)?;
        if existing.as_ref().is_some_and(SubscriptionRecord::is_active) {
            return Err(AppError::conflict("An active subscription already exists.")
                .with_name("ALREADY_SUBSCRIBED"));
        }

        let session = client
            .create_checkout_session(email, user_id)
            .await
            .map_err(|error| AppError::integration(BILLING_SERVICE, error))?;

        self.subscriptions
            .save(
                user_id,
                SubscriptionUpdate {
                    customer_id: session.customer.clone(),
                    checkout_session_id: Some(session.id.clone()),
                    status: "pending".to_owned(),
                    ..Default::default()
                },
            )
            .await
            .map_err(AppError::from_anyhow)?;

        info!(user_id, session_id = %session.id, "checkout session created");
        Ok(session)
    }

    /// The stored subscription, refreshed from the provider when one is known.
    pub async fn current(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, AppError> {
        let client = self.client()?;
        let Some(record) = self
            .subscriptions
            .find(user_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(None);
        };

        let subscription_id = match (&record.subscription_id, &record.checkout_session_id) {
            (Some(id), _) => id.clone(),
            (None, Some(session_id)) => {
                let session = client
                    .fetch_checkout_session(session_id)
                    .await
                    .map_err(|error| AppError::integration(BILLING_SERVICE, error))?;
                match session.subscription {
                    Some(id) => id,
                    None => return Ok(Some(record)),
                }
            }
            (None, None) => return Ok(Some(record)),
        };

        let remote = client
            .fetch_subscription(&subscription_id)
            .await
            .map_err(|error| AppError::integration(BILLING_SERVICE, error))?;

        self.subscriptions
            .save(user_id, remote.to_update())
            .await
            .map(Some)
            .map_err(AppError::from_anyhow)
    }

    pub async fn cancel(&self, user_id: &str) -> Result<SubscriptionRecord, AppError> {
        let client = self.client()?;
        let record = self.current(user_id).await?;
        let Some(subscription_id) = record.and_then(|record| record.subscription_id) else {
            return Err(AppError::not_found("No subscription to cancel.")
                .with_name("SUBSCRIPTION_NOT_FOUND"));
        };

        let remote = client
            .cancel_subscription(&subscription_id)
            .await
            .map_err(|error| AppError::integration(BILLING_SERVICE, error))?;

        info!(user_id, subscription_id, "subscription cancellation requested");
        self.subscriptions
            .save(user_id, remote.to_update())
            .await
            .map_err(AppError::from_anyhow)
    }
}
