use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, Result as AnyResult};
use axum::extract::FromRef;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use taskhive_core::{
    access::AccessResolver, calendar_connection::CalendarConnectionStore, config::AppConfig,
    db::Database, subscription::SubscriptionStore, user::UserStore, workspace::WorkspaceStore,
};

use crate::{
    ai::{AiService, GeminiClient, GenerativeClient},
    billing::{BillingClient, BillingService, StripeClient},
    calendar::CalendarService,
    crypto::TokenSigner,
    email::{EmailSender, HttpEmailSender, Mailer},
    user::service::UserService,
    workspace::service::WorkspaceService,
};

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub user_store: UserStore,
    pub workspace_store: WorkspaceStore,
    pub access_resolver: AccessResolver,
    pub calendar_connections: CalendarConnectionStore,
    pub subscriptions: SubscriptionStore,
    pub token_signer: Arc<TokenSigner>,
    pub user_service: Arc<UserService>,
    pub workspace_service: Arc<WorkspaceService>,
    pub ai: Arc<AiService>,
    pub calendar: Arc<CalendarService>,
    pub mailer: Mailer,
    pub billing: Arc<BillingService>,
    pub metadata: ServerMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerMetadata {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub message: String,
}

impl ServerMetadata {
    pub fn load(config: &AppConfig) -> Self {
        let name = env::var("TASKHIVE_SERVER_NAME").unwrap_or_else(|_| "taskhive".to_string());
        let version = env!("CARGO_PKG_VERSION").to_string();
        let environment = if config.is_development() {
            "development"
        } else {
            "production"
        }
        .to_string();
        let message = env::var("TASKHIVE_SERVER_MESSAGE")
            .unwrap_or_else(|_| format!("Taskhive {version} Server"));

        Self {
            name,
            version,
            environment,
            message,
        }
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ServerMetadata {
    fn from_ref(state: &AppState) -> Self {
        state.metadata.clone()
    }
}

/// Shared outbound client for every third-party integration.
pub(crate) fn build_http_client() -> AnyResult<Client> {
    Client::builder()
        .timeout(OUTBOUND_TIMEOUT)
        .user_agent(concat!("taskhive/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build outbound http client")
}

pub fn build_state(database: &Database, app_config: &AppConfig) -> AnyResult<AppState> {
    let client = build_http_client()?;

    let user_store = UserStore::new(database);
    let workspace_store = WorkspaceStore::new(database);
    let access_resolver = AccessResolver::new(database);
    let calendar_connections = CalendarConnectionStore::new(database);
    let subscriptions = SubscriptionStore::new(database);
    let token_signer = Arc::new(TokenSigner::new(
        &app_config.jwt_secret,
        app_config.jwt_ttl_seconds,
    ));

    let mailer = Mailer::new(app_config.email.clone().map(|config| {
        Arc::new(HttpEmailSender::new(client.clone(), config)) as Arc<dyn EmailSender>
    }));

    let ai = Arc::new(AiService::new(app_config.ai.clone().map(|config| {
        Arc::new(GeminiClient::new(client.clone(), config)) as Arc<dyn GenerativeClient>
    })));

    let calendar = Arc::new(CalendarService::from_config(
        &client,
        &app_config.calendar,
        calendar_connections.clone(),
    ));

    let billing = Arc::new(BillingService::new(
        app_config.billing.clone().map(|config| {
            Arc::new(StripeClient::new(client.clone(), config)) as Arc<dyn BillingClient>
        }),
        subscriptions.clone(),
    ));

    let user_service = Arc::new(UserService::new(
        user_store.clone(),
        workspace_store.clone(),
        token_signer.clone(),
        mailer.clone(),
    ));
    let workspace_service = Arc::new(WorkspaceService::new(workspace_store.clone()));

    info!(
        ai = ai.is_enabled(),
        email = mailer.is_enabled(),
        billing = billing.is_enabled(),
        calendar_providers = ?calendar.providers(),
        "integrations configured"
    );

    Ok(AppState {
        config: Arc::new(app_config.clone()),
        database: database.clone(),
        user_store,
        workspace_store,
        access_resolver,
        calendar_connections,
        subscriptions,
        token_signer,
        user_service,
        workspace_service,
        ai,
        calendar,
        mailer,
        billing,
        metadata: ServerMetadata::load(app_config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_reports_environment() {
        let config = AppConfig {
            environment: taskhive_core::config::Environment::Development,
            ..AppConfig::default()
        };
        let metadata = ServerMetadata::load(&config);
        assert_eq!(metadata.environment, "development");
        assert_eq!(metadata.version, env!("CARGO_PKG_VERSION"));

        let json = serde_json::to_value(&metadata).expect("metadata serializes");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unconfigured_integrations_stay_disabled() {
        let (_dir, _database, state) = crate::test_support::setup_state().await;
        assert!(!state.ai.is_enabled());
        assert!(!state.mailer.is_enabled());
        assert!(!state.billing.is_enabled());
        assert!(state.calendar.providers().is_empty());
    }
}
