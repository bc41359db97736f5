use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDateTime, SecondsFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use taskhive_core::{calendar_connection::CalendarProviderKind, config::CalendarProviderConfig};
use url::Url;

use super::provider::{
    CalendarEvent, CalendarProfile, CalendarProvider, CalendarTokens, ensure_success, parse_date,
    parse_instant, request_tokens,
};

const LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
const GRAPH_ME_URL: &str = "https://graph.microsoft.com/v1.0/me";
const GRAPH_EVENTS_URL: &str = "https://graph.microsoft.com/v1.0/me/events";
const MICROSOFT_SCOPE: &str = "offline_access User.Read Calendars.ReadWrite";
const DEFAULT_TENANT: &str = "common";
const GRAPH_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct MicrosoftCalendarProvider {
    client: Client,
    config: CalendarProviderConfig,
}

impl MicrosoftCalendarProvider {
    pub fn new(client: Client, config: CalendarProviderConfig) -> Self {
        Self { client, config }
    }

    fn tenant(&self) -> &str {
        self.config
            .tenant
            .as_deref()
            .filter(|tenant| !tenant.trim().is_empty())
            .unwrap_or(DEFAULT_TENANT)
    }

    fn token_url(&self) -> String {
        format!("{LOGIN_BASE_URL}/{}/oauth2/v2.0/token", self.tenant())
    }

    fn event_url(event_id: &str) -> Result<Url> {
        let mut url = Url::parse(GRAPH_EVENTS_URL).context("parse graph events url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("graph events url cannot be a base"))?
            .push(event_id);
        Ok(url)
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphDateTime {
    pub(crate) date_time: String,
    #[serde(default)]
    pub(crate) time_zone: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphBody {
    pub(crate) content_type: String,
    #[serde(default)]
    pub(crate) content: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphLocation {
    #[serde(default)]
    pub(crate) display_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) body: Option<GraphBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) location: Option<GraphLocation>,
    #[serde(default)]
    pub(crate) start: GraphDateTime,
    #[serde(default)]
    pub(crate) end: GraphDateTime,
    #[serde(default)]
    pub(crate) is_all_day: bool,
}

/// Graph wants naive wall-clock times plus a zone; we always send UTC.
/// All-day events run midnight to midnight with an exclusive end.
pub(crate) fn to_graph_event(event: &CalendarEvent) -> GraphEvent {
    let (start, end) = if event.all_day {
        let start = parse_date(&event.start).map(|date| format!("{date}T00:00:00"));
        let end = parse_date(&event.end)
            .and_then(|date| date.checked_add_days(Days::new(1)))
            .map(|date| format!("{date}T00:00:00"));
        (
            start.unwrap_or_else(|| event.start.clone()),
            end.unwrap_or_else(|| event.end.clone()),
        )
    } else {
        (utc_wall_clock(&event.start), utc_wall_clock(&event.end))
    };

    GraphEvent {
        id: None,
        subject: Some(event.title.clone()),
        body: event.description.as_ref().map(|content| GraphBody {
            content_type: "text".to_owned(),
            content: content.clone(),
        }),
        location: event.location.as_ref().map(|name| GraphLocation {
            display_name: name.clone(),
        }),
        start: GraphDateTime {
            date_time: start,
            time_zone: Some("UTC".to_owned()),
        },
        end: GraphDateTime {
            date_time: end,
            time_zone: Some("UTC".to_owned()),
        },
        is_all_day: event.all_day,
    }
}

fn utc_wall_clock(value: &str) -> String {
    parse_instant(value)
        .map(|instant| instant.naive_utc().format(GRAPH_DATE_TIME_FORMAT).to_string())
        .unwrap_or_else(|| value.trim().to_owned())
}

/// Graph returns e.g. `2024-05-06T09:00:00.0000000`.
fn parse_graph_date_time(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    let seconds = trimmed.split('.').next().unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(seconds, GRAPH_DATE_TIME_FORMAT).ok()
}

pub(crate) fn from_graph_event(event: GraphEvent) -> CalendarEvent {
    let start = parse_graph_date_time(&event.start.date_time);
    let end = parse_graph_date_time(&event.end.date_time);

    let (start, end) = if event.is_all_day {
        let start_date = start.map(|value| value.date());
        let end_date = end
            .map(|value| value.date())
            .and_then(|date| date.checked_sub_days(Days::new(1)))
            .or(start_date);
        (
            start_date.map(|date| date.to_string()).unwrap_or_default(),
            end_date.map(|date| date.to_string()).unwrap_or_default(),
        )
    } else {
        let render = |value: Option<NaiveDateTime>, raw: &str| {
            value
                .map(|naive| naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| raw.to_owned())
        };
        (
            render(start, &event.start.date_time),
            render(end, &event.end.date_time),
        )
    };

    CalendarEvent {
        id: event.id,
        title: event.subject.unwrap_or_default(),
        description: event
            .body
            .map(|body| body.content)
            .filter(|content| !content.is_empty()),
        location: event
            .location
            .map(|location| location.display_name)
            .filter(|name| !name.is_empty()),
        start,
        end,
        all_day: event.is_all_day,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl CalendarProvider for MicrosoftCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Microsoft
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&format!(
            "{LOGIN_BASE_URL}/{}/oauth2/v2.0/authorize",
            self.tenant()
        ))
        .context("parse microsoft auth url")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
            .append_pair("scope", MICROSOFT_SCOPE)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<CalendarTokens> {
        request_tokens(
            &self.client,
            self.kind(),
            &self.token_url(),
            &[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("scope", MICROSOFT_SCOPE),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CalendarTokens> {
        let mut tokens = request_tokens(
            &self.client,
            self.kind(),
            &self.token_url(),
            &[
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("scope", MICROSOFT_SCOPE),
            ],
        )
        .await?;
        tokens
            .refresh_token
            .get_or_insert_with(|| refresh_token.to_owned());
        Ok(tokens)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<CalendarProfile> {
        let response = self
            .client
            .get(GRAPH_ME_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .context("request graph profile")?;

        let user = ensure_success(self.kind(), response)
            .await?
            .json::<GraphUser>()
            .await
            .context("decode graph profile")?;

        Ok(CalendarProfile {
            email: user.mail.or(user.user_principal_name),
            name: user.display_name,
        })
    }

    async fn create_event(
        &self,
        access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent> {
        let response = self
            .client
            .post(GRAPH_EVENTS_URL)
            .bearer_auth(access_token)
            .json(&to_graph_event(event))
            .send()
            .await
            .context("create graph event")?;

        let created = ensure_success(self.kind(), response)
            .await?
            .json::<GraphEvent>()
            .await
            .context("decode graph event")?;
        Ok(from_graph_event(created))
    }

    async fn get_event(&self, access_token: &str, event_id: &str) -> Result<CalendarEvent> {
        let response = self
            .client
            .get(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .send()
            .await
            .context("fetch graph event")?;

        let event = ensure_success(self.kind(), response)
            .await?
            .json::<GraphEvent>()
            .await
            .context("decode graph event")?;
        Ok(from_graph_event(event))
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent> {
        let response = self
            .client
            .patch(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .json(&to_graph_event(event))
            .send()
            .await
            .context("update graph event")?;

        let updated = ensure_success(self.kind(), response)
            .await?
            .json::<GraphEvent>()
            .await
            .context("decode graph event")?;
        Ok(from_graph_event(updated))
    }

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .context("delete graph event")?;

        ensure_success(self.kind(), response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn timed_events_use_utc_wall_clock() {
        let event = CalendarEvent {
            title: "Delivery window".into(),
            description: Some("Dock 2".into()),
            start: "2024-05-06T08:00:00-04:00".into(),
            end: "2024-05-06T09:00:00-04:00".into(),
            ..Default::default()
        };

        let wire = serde_json::to_value(to_graph_event(&event)).expect("encode");
        assert_eq!(
            wire,
            json!({
                "subject": "Delivery window",
                "body": { "contentType": "text", "content": "Dock 2" },
                "start": { "dateTime": "2024-05-06T12:00:00", "timeZone": "UTC" },
                "end": { "dateTime": "2024-05-06T13:00:00", "timeZone": "UTC" },
                "isAllDay": false
            })
        );
    }

    #[test]
    fn decodes_graph_event_with_fractional_seconds() {
        let wire: GraphEvent = serde_json::from_value(json!({
            "id": "AAMk",
            "subject": "Roster review",
            "body": { "contentType": "html", "content": "" },
            "location": { "displayName": "Back office" },
            "start": { "dateTime": "2024-05-06T09:00:00.0000000", "timeZone": "UTC" },
            "end": { "dateTime": "2024-05-06T09:45:00.0000000", "timeZone": "UTC" },
            "isAllDay": false
        }))
        .expect("decode");

        let event = from_graph_event(wire);
        assert_eq!(event.id.as_deref(), Some("AAMk"));
        assert_eq!(event.start, "2024-05-06T09:00:00Z");
        assert_eq!(event.end, "2024-05-06T09:45:00Z");
        assert_eq!(event.location.as_deref(), Some("Back office"));
        assert!(event.description.is_none());
    }

    #[test]
    fn all_day_events_round_trip_inclusive_end() {
        let event = CalendarEvent {
            title: "Stocktake".into(),
            start: "2024-05-06".into(),
            end: "2024-05-06".into(),
            all_day: true,
            ..Default::default()
        };
        let wire = to_graph_event(&event);
        assert_eq!(wire.end.date_time, "2024-05-07T00:00:00");

        let back = from_graph_event(wire);
        assert_eq!(back.start, "2024-05-06");
        assert_eq!(back.end, "2024-05-06");
        assert!(back.all_day);
    }

    #[test]
    fn tenant_defaults_to_common() {
        let provider = MicrosoftCalendarProvider::new(
            Client::new(),
            CalendarProviderConfig {
                client_id: "cid".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost/cb".into(),
                tenant: None,
            },
        );
        assert_eq!(
            provider.token_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
        let url = provider.authorization_url("s").expect("url");
        assert!(url.starts_with("https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"));
    }
}
