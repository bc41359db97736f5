use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use taskhive_core::calendar_connection::CalendarProviderKind;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalendarProfile {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Provider-neutral event.
///
/// `start`/`end` are RFC 3339 timestamps, or `YYYY-MM-DD` dates when
/// `all_day` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub all_day: bool,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_owned());
        }

        if self.all_day {
            let start = parse_date(&self.start).ok_or("start must be a YYYY-MM-DD date")?;
            let end = parse_date(&self.end).ok_or("end must be a YYYY-MM-DD date")?;
            if end < start {
                return Err("end must not be before start".to_owned());
            }
        } else {
            let start = parse_instant(&self.start).ok_or("start must be an RFC 3339 timestamp")?;
            let end = parse_instant(&self.end).ok_or("end must be an RFC 3339 timestamp")?;
            if end <= start {
                return Err("end must be after start".to_owned());
            }
        }

        Ok(())
    }
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub(crate) fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}

/// A non-2xx answer from a provider API.
#[derive(Debug, Error)]
#[error("{provider} responded {status}: {body}")]
pub struct ProviderStatusError {
    pub provider: CalendarProviderKind,
    pub status: u16,
    pub body: String,
}

impl ProviderStatusError {
    pub fn is_not_found(&self) -> bool {
        matches!(self.status, 404 | 410)
    }
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> CalendarProviderKind;

    fn authorization_url(&self, state: &str) -> Result<String>;

    async fn exchange_code(&self, code: &str) -> Result<CalendarTokens>;

    async fn refresh(&self, refresh_token: &str) -> Result<CalendarTokens>;

    async fn fetch_profile(&self, access_token: &str) -> Result<CalendarProfile>;

    async fn create_event(
        &self,
        access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent>;

    async fn get_event(&self, access_token: &str, event_id: &str) -> Result<CalendarEvent>;

    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent>;

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()>;
}

pub(crate) async fn ensure_success(
    provider: CalendarProviderKind,
    response: Response,
) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable>".to_owned());
    Err(ProviderStatusError {
        provider,
        status,
        body,
    }
    .into())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// POST an OAuth2 token request (`authorization_code` or `refresh_token`).
pub(crate) async fn request_tokens(
    client: &Client,
    provider: CalendarProviderKind,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<CalendarTokens> {
    let body = serde_urlencoded::to_string(form).context("encode token request")?;

    let response = client
        .post(token_url)
        .header("content-type", "application/x-www-form-urlencoded")
        .header("accept", "application/json")
        .body(body)
        .send()
        .await
        .with_context(|| format!("request {provider} token"))?;

    let payload = ensure_success(provider, response)
        .await?
        .json::<TokenResponse>()
        .await
        .with_context(|| format!("decode {provider} token response"))?;

    Ok(CalendarTokens {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
        expires_at: payload
            .expires_in
            .map(|seconds| Utc::now().timestamp() + seconds as i64),
    })
}
