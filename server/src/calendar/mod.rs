mod google;
mod microsoft;
mod provider;
mod state_store;

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Error as AnyError;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use taskhive_core::{
    calendar_connection::{
        CalendarConnection, CalendarConnectionStore, CalendarProviderKind, NewCalendarTokens,
    },
    config::CalendarConfig,
};
use tracing::{info, warn};

pub use google::GoogleCalendarProvider;
pub use microsoft::MicrosoftCalendarProvider;
pub use provider::{
    CalendarEvent, CalendarProfile, CalendarProvider, CalendarTokens, ProviderStatusError,
};

use self::state_store::{CalendarAuthState, CalendarStateStore};
use crate::AppError;

const CALENDAR_STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct CalendarService {
    providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>>,
    connections: CalendarConnectionStore,
    state_store: CalendarStateStore,
}

impl CalendarService {
    pub fn new(connections: CalendarConnectionStore) -> Self {
        Self {
            providers: HashMap::new(),
            connections,
            state_store: CalendarStateStore::new(CALENDAR_STATE_TTL),
        }
    }

    /// Register every provider that has credentials in `config`.
    pub fn from_config(
        client: &Client,
        config: &CalendarConfig,
        connections: CalendarConnectionStore,
    ) -> Self {
        let mut service = Self::new(connections);
        if let Some(google) = config.google.clone() {
            service = service.with_provider(Arc::new(GoogleCalendarProvider::new(
                client.clone(),
                google,
            )));
        }
        if let Some(microsoft) = config.microsoft.clone() {
            service = service.with_provider(Arc::new(MicrosoftCalendarProvider::new(
                client.clone(),
                microsoft,
            )));
        }
        service
    }

    pub fn with_provider(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn providers(&self) -> Vec<CalendarProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }

    fn provider(&self, kind: CalendarProviderKind) -> Result<&Arc<dyn CalendarProvider>, AppError> {
        self.providers
            .get(&kind)
            .ok_or_else(|| AppError::dependency_unavailable(&format!("{kind} calendar")))
    }

    pub async fn authorization_url(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
    ) -> Result<String, AppError> {
        let provider = self.provider(kind)?;
        let state = self
            .state_store
            .insert(CalendarAuthState {
                user_id: user_id.to_owned(),
                provider: kind,
            })
            .await;
        provider
            .authorization_url(&state)
            .map_err(|error| integration_error(kind, error))
    }

    /// Exchange an authorization code and persist the resulting tokens.
    ///
    /// `state`, when supplied, must be one issued to this user for this
    /// provider by [`Self::authorization_url`].
    pub async fn connect(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
        code: &str,
        state: Option<&str>,
    ) -> Result<CalendarConnection, AppError> {
        let provider = self.provider(kind)?;

        if code.trim().is_empty() {
            return Err(AppError::bad_request("authorization code is required"));
        }

        if let Some(state) = state {
            let expected = CalendarAuthState {
                user_id: user_id.to_owned(),
                provider: kind,
            };
            if self.state_store.take(state).await.as_ref() != Some(&expected) {
                return Err(AppError::bad_request("invalid or expired calendar state")
                    .with_name("INVALID_CALENDAR_STATE"));
            }
        }

        let tokens = provider
            .exchange_code(code.trim())
            .await
            .map_err(|error| integration_error(kind, error))?;

        let profile = match provider.fetch_profile(&tokens.access_token).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(?error, provider = %kind, "failed to fetch calendar profile");
                CalendarProfile::default()
            }
        };

        let connection = self
            .connections
            .save(user_id, kind, new_tokens(tokens), profile.email)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(user_id, provider = %kind, "calendar connected");
        Ok(connection)
    }

    pub async fn disconnect(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
    ) -> Result<bool, AppError> {
        self.connections
            .delete(user_id, kind)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn connection(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
    ) -> Result<Option<CalendarConnection>, AppError> {
        self.connections
            .find(user_id, kind)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub fn is_configured(&self, kind: CalendarProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// A usable access token, refreshing and persisting it when stale.
    async fn access_token(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
    ) -> Result<String, AppError> {
        let provider = self.provider(kind)?;
        let Some(connection) = self.connection(user_id, kind).await? else {
            return Err(AppError::invalid_operation(format!("{kind} calendar is not connected"))
                .with_name("CALENDAR_NOT_CONNECTED"));
        };

        if !connection.is_expired(Utc::now().timestamp()) {
            return Ok(connection.access_token);
        }

        let Some(refresh_token) = connection.refresh_token.as_deref() else {
            return Err(AppError::invalid_operation(format!(
                "{kind} calendar session expired; reconnect the calendar"
            ))
            .with_name("CALENDAR_NOT_CONNECTED"));
        };

        let tokens = provider
            .refresh(refresh_token)
            .await
            .map_err(|error| integration_error(kind, error))?;

        let refreshed = self
            .connections
            .save(user_id, kind, new_tokens(tokens), None)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(user_id, provider = %kind, "calendar token refreshed");
        Ok(refreshed.access_token)
    }

    pub async fn create_event(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent, AppError> {
        event.validate().map_err(AppError::bad_request)?;
        let token = self.access_token(user_id, kind).await?;
        self.provider(kind)?
            .create_event(&token, event)
            .await
            .map_err(|error| event_error(kind, None, error))
    }

    pub async fn get_event(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
        event_id: &str,
    ) -> Result<CalendarEvent, AppError> {
        let token = self.access_token(user_id, kind).await?;
        self.provider(kind)?
            .get_event(&token, event_id)
            .await
            .map_err(|error| event_error(kind, Some(event_id), error))
    }

    pub async fn update_event(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent, AppError> {
        event.validate().map_err(AppError::bad_request)?;
        let token = self.access_token(user_id, kind).await?;
        self.provider(kind)?
            .update_event(&token, event_id, event)
            .await
            .map_err(|error| event_error(kind, Some(event_id), error))
    }

    pub async fn delete_event(
        &self,
        user_id: &str,
        kind: CalendarProviderKind,
        event_id: &str,
    ) -> Result<(), AppError> {
        let token = self.access_token(user_id, kind).await?;
        self.provider(kind)?
            .delete_event(&token, event_id)
            .await
            .map_err(|error| event_error(kind, Some(event_id), error))
    }
}

fn new_tokens(tokens: CalendarTokens) -> NewCalendarTokens {
    NewCalendarTokens {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens.expires_at,
    }
}

fn integration_error(kind: CalendarProviderKind, error: AnyError) -> AppError {
    AppError::integration(&format!("{kind} calendar"), error)
}

fn event_error(kind: CalendarProviderKind, event_id: Option<&str>, error: AnyError) -> AppError {
    let missing = error
        .downcast_ref::<ProviderStatusError>()
        .is_some_and(ProviderStatusError::is_not_found);
    match event_id {
        Some(event_id) if missing => AppError::resource_not_found("Calendar event", event_id)
            .with_data(json!({ "id": event_id, "provider": kind.as_str() })),
        _ => integration_error(kind, error),
    }
}
