use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, SecondsFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use taskhive_core::{calendar_connection::CalendarProviderKind, config::CalendarProviderConfig};
use url::Url;

use super::provider::{
    CalendarEvent, CalendarProfile, CalendarProvider, CalendarTokens, ensure_success, parse_date,
    parse_instant, request_tokens,
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const GOOGLE_SCOPE: &str = "openid email https://www.googleapis.com/auth/calendar.events";

pub struct GoogleCalendarProvider {
    client: Client,
    config: CalendarProviderConfig,
}

impl GoogleCalendarProvider {
    pub fn new(client: Client, config: CalendarProviderConfig) -> Self {
        Self { client, config }
    }

    fn event_url(event_id: &str) -> Result<Url> {
        let mut url = Url::parse(GOOGLE_EVENTS_URL).context("parse google events url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("google events url cannot be a base"))?
            .push(event_id);
        Ok(url)
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) time_zone: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) start: GoogleEventTime,
    #[serde(default)]
    pub(crate) end: GoogleEventTime,
}

/// Google treats all-day `end` dates as exclusive; ours are inclusive.
pub(crate) fn to_google_event(event: &CalendarEvent) -> GoogleEvent {
    let (start, end) = if event.all_day {
        let end = parse_date(&event.end)
            .and_then(|date| date.checked_add_days(Days::new(1)))
            .map(|date| date.to_string())
            .unwrap_or_else(|| event.end.clone());
        (
            GoogleEventTime {
                date: Some(event.start.trim().to_owned()),
                ..Default::default()
            },
            GoogleEventTime {
                date: Some(end),
                ..Default::default()
            },
        )
    } else {
        (timed(&event.start), timed(&event.end))
    };

    GoogleEvent {
        id: None,
        summary: Some(event.title.clone()),
        description: event.description.clone(),
        location: event.location.clone(),
        start,
        end,
    }
}

fn timed(value: &str) -> GoogleEventTime {
    let date_time = parse_instant(value)
        .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| value.trim().to_owned());
    GoogleEventTime {
        date_time: Some(date_time),
        time_zone: Some("UTC".to_owned()),
        ..Default::default()
    }
}

pub(crate) fn from_google_event(event: GoogleEvent) -> CalendarEvent {
    let all_day = event.start.date.is_some();
    let (start, end) = if all_day {
        let start = event.start.date.unwrap_or_default();
        let end = event
            .end
            .date
            .as_deref()
            .and_then(parse_date)
            .and_then(|date| date.checked_sub_days(Days::new(1)))
            .map(|date| date.to_string())
            .unwrap_or_else(|| start.clone());
        (start, end)
    } else {
        (
            event.start.date_time.unwrap_or_default(),
            event.end.date_time.unwrap_or_default(),
        )
    };

    CalendarEvent {
        id: event.id,
        title: event.summary.unwrap_or_default(),
        description: event.description,
        location: event.location,
        start,
        end,
        all_day,
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Google
    }

    fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(GOOGLE_AUTH_URL).context("parse google auth url")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", GOOGLE_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<CalendarTokens> {
        request_tokens(
            &self.client,
            self.kind(),
            GOOGLE_TOKEN_URL,
            &[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CalendarTokens> {
        let mut tokens = request_tokens(
            &self.client,
            self.kind(),
            GOOGLE_TOKEN_URL,
            &[
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ],
        )
        .await?;
        // Google omits the refresh token on refresh; the old one stays valid.
        tokens
            .refresh_token
            .get_or_insert_with(|| refresh_token.to_owned());
        Ok(tokens)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<CalendarProfile> {
        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .context("request google userinfo")?;

        let user = ensure_success(self.kind(), response)
            .await?
            .json::<GoogleUserInfo>()
            .await
            .context("decode google userinfo")?;

        Ok(CalendarProfile {
            email: user.email,
            name: user.name,
        })
    }

    async fn create_event(
        &self,
        access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent> {
        let response = self
            .client
            .post(GOOGLE_EVENTS_URL)
            .bearer_auth(access_token)
            .json(&to_google_event(event))
            .send()
            .await
            .context("create google event")?;

        let created = ensure_success(self.kind(), response)
            .await?
            .json::<GoogleEvent>()
            .await
            .context("decode google event")?;
        Ok(from_google_event(created))
    }

    async fn get_event(&self, access_token: &str, event_id: &str) -> Result<CalendarEvent> {
        let response = self
            .client
            .get(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .context("fetch google event")?;

        let event = ensure_success(self.kind(), response)
            .await?
            .json::<GoogleEvent>()
            .await
            .context("decode google event")?;
        Ok(from_google_event(event))
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent> {
        let response = self
            .client
            .put(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .json(&to_google_event(event))
            .send()
            .await
            .context("update google event")?;

        let updated = ensure_success(self.kind(), response)
            .await?
            .json::<GoogleEvent>()
            .await
            .context("decode google event")?;
        Ok(from_google_event(updated))
    }

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(Self::event_url(event_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .context("delete google event")?;

        ensure_success(self.kind(), response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn timed_events_map_to_date_time_fields() {
        let event = CalendarEvent {
            title: "Supplier call".into(),
            location: Some("Office".into()),
            start: "2024-05-06T11:00:00+02:00".into(),
            end: "2024-05-06T11:30:00+02:00".into(),
            ..Default::default()
        };

        let wire = serde_json::to_value(to_google_event(&event)).expect("encode");
        assert_eq!(
            wire,
            json!({
                "summary": "Supplier call",
                "location": "Office",
                "start": { "dateTime": "2024-05-06T09:00:00Z", "timeZone": "UTC" },
                "end": { "dateTime": "2024-05-06T09:30:00Z", "timeZone": "UTC" }
            })
        );
    }

    #[test]
    fn all_day_end_dates_are_shifted() {
        let event = CalendarEvent {
            title: "Stocktake".into(),
            start: "2024-05-06".into(),
            end: "2024-05-07".into(),
            all_day: true,
            ..Default::default()
        };
        let wire = to_google_event(&event);
        assert_eq!(wire.start.date.as_deref(), Some("2024-05-06"));
        assert_eq!(wire.end.date.as_deref(), Some("2024-05-08"));

        let back = from_google_event(GoogleEvent {
            id: Some("evt".into()),
            ..wire
        });
        assert_eq!(back.end, "2024-05-07");
        assert!(back.all_day);
        assert_eq!(back.id.as_deref(), Some("evt"));
    }

    #[test]
    fn decodes_wire_event() {
        let wire: GoogleEvent = serde_json::from_value(json!({
            "id": "abc",
            "summary": "Standup",
            "status": "confirmed",
            "start": { "dateTime": "2024-05-06T09:00:00Z" },
            "end": { "dateTime": "2024-05-06T09:15:00Z" }
        }))
        .expect("decode");
        let event = from_google_event(wire);
        assert_eq!(event.title, "Standup");
        assert_eq!(event.start, "2024-05-06T09:00:00Z");
        assert!(!event.all_day);
    }

    #[test]
    fn event_urls_escape_ids() {
        let url = GoogleCalendarProvider::event_url("a/b c").expect("url");
        assert!(url.as_str().ends_with("/events/a%2Fb%20c"));
    }

    #[test]
    fn authorization_url_requests_offline_access() {
        let provider = GoogleCalendarProvider::new(
            Client::new(),
            CalendarProviderConfig {
                client_id: "cid".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost/cb".into(),
                tenant: None,
            },
        );
        let url = Url::parse(&provider.authorization_url("st4te").expect("url")).expect("parse");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("state".into(), "st4te".into())));
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
    }
}
