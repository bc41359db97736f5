use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::{
        Database,
        calendar_connection_repo::{CalendarConnectionRepositoryRef, UpsertCalendarConnection},
    },
    ids::UserId,
};

/// Seconds before expiry at which a token is already treated as stale.
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProviderKind {
    Google,
    Microsoft,
}

impl CalendarProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for CalendarProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "microsoft" | "outlook" => Ok(Self::Microsoft),
            other => Err(anyhow!("unsupported calendar provider: {other}")),
        }
    }
}

/// Opaque provider tokens held on behalf of a user.
#[derive(Debug, Clone)]
pub struct CalendarConnection {
    pub user_id: UserId,
    pub provider: CalendarProviderKind,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub account_email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CalendarConnection {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + EXPIRY_SKEW_SECONDS)
    }
}

#[derive(Debug, Clone)]
pub struct NewCalendarTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

#[derive(Clone)]
pub struct CalendarConnectionStore {
    repo: CalendarConnectionRepositoryRef,
}

impl CalendarConnectionStore {
    pub fn new(database: &Database) -> Self {
        Self {
            repo: database.repositories().calendar_connection_repo(),
        }
    }

    /// Insert or replace the tokens for `(user, provider)`. A missing refresh
    /// token keeps the one already stored.
    pub async fn save(
        &self,
        user_id: &str,
        provider: CalendarProviderKind,
        tokens: NewCalendarTokens,
        account_email: Option<String>,
    ) -> Result<CalendarConnection> {
        self.repo
            .upsert(UpsertCalendarConnection {
                user_id: user_id.to_owned(),
                provider,
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: tokens.expires_at,
                account_email,
                now: Utc::now().timestamp(),
            })
            .await
    }

    pub async fn find(
        &self,
        user_id: &str,
        provider: CalendarProviderKind,
    ) -> Result<Option<CalendarConnection>> {
        self.repo.fetch(user_id, provider).await
    }

    pub async fn delete(&self, user_id: &str, provider: CalendarProviderKind) -> Result<bool> {
        self.repo.delete(user_id, provider).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_workspace, test_database};

    #[tokio::test]
    async fn save_keeps_refresh_token_when_provider_omits_it() {
        let (_dir, database) = test_database().await;
        let workspace = seed_workspace(&database).await;
        let store = CalendarConnectionStore::new(&database);

        store
            .save(
                &workspace.owner_id,
                CalendarProviderKind::Google,
                NewCalendarTokens {
                    access_token: "a1".into(),
                    refresh_token: Some("r1".into()),
                    expires_at: Some(100),
                },
                Some("me@example.com".into()),
            )
            .await
            .unwrap();
        let refreshed = store
            .save(
                &workspace.owner_id,
                CalendarProviderKind::Google,
                NewCalendarTokens {
                    access_token: "a2".into(),
                    refresh_token: None,
                    expires_at: Some(5_000),
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(refreshed.access_token, "a2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r1"));
        assert_eq!(refreshed.account_email.as_deref(), Some("me@example.com"));
        assert!(refreshed.is_expired(4_950));
        assert!(!refreshed.is_expired(1_000));

        assert!(
            store
                .delete(&workspace.owner_id, CalendarProviderKind::Google)
                .await
                .unwrap()
        );
        assert!(
            store
                .find(&workspace.owner_id, CalendarProviderKind::Google)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(
            "Google".parse::<CalendarProviderKind>().unwrap(),
            CalendarProviderKind::Google
        );
        assert_eq!(
            "outlook".parse::<CalendarProviderKind>().unwrap(),
            CalendarProviderKind::Microsoft
        );
        assert!("icloud".parse::<CalendarProviderKind>().is_err());
    }
}
