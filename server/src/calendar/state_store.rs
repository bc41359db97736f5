use std::time::Duration;

use moka::future::Cache;
use taskhive_core::calendar_connection::CalendarProviderKind;
use uuid::Uuid;

/// Short-lived `state` values handed out with authorization URLs.
#[derive(Clone)]
pub(crate) struct CalendarStateStore {
    cache: Cache<String, CalendarAuthState>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CalendarAuthState {
    pub(crate) user_id: String,
    pub(crate) provider: CalendarProviderKind,
}

impl CalendarStateStore {
    pub(crate) fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(4096)
            .build();
        Self { cache }
    }

    pub(crate) async fn insert(&self, state: CalendarAuthState) -> String {
        let token = Uuid::new_v4().to_string();
        self.cache.insert(token.clone(), state).await;
        token
    }

    /// Single use: the entry is removed whether or not it matches.
    pub(crate) async fn take(&self, token: &str) -> Option<CalendarAuthState> {
        self.cache.remove(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn states_are_single_use() {
        let store = CalendarStateStore::new(Duration::from_secs(60));
        let state = CalendarAuthState {
            user_id: "u1".into(),
            provider: CalendarProviderKind::Google,
        };
        let token = store.insert(state.clone()).await;

        assert_eq!(store.take(&token).await, Some(state));
        assert_eq!(store.take(&token).await, None);
        assert_eq!(store.take("unknown").await, None);
    }
}
