use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    calendar_connection::{CalendarConnection, CalendarProviderKind},
    db::calendar_connection_repo::{CalendarConnectionRepository, UpsertCalendarConnection},
    ids::UserId,
};

pub struct SqliteCalendarConnectionRepository {
    pool: Pool<Sqlite>,
}

impl SqliteCalendarConnectionRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> Result<CalendarConnection> {
        let provider: String = row.get("provider");
        Ok(CalendarConnection {
            user_id: UserId::from(row.get::<String, _>("user_id")),
            provider: provider.parse()?,
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            expires_at: row.get("expires_at"),
            account_email: row.get("account_email"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl CalendarConnectionRepository for SqliteCalendarConnectionRepository {
    async fn upsert(&self, params: UpsertCalendarConnection) -> Result<CalendarConnection> {
        let row = sqlx::query(
            "INSERT INTO calendar_connections (
                 user_id,
                 provider,
                 access_token,
                 refresh_token,
                 expires_at,
                 account_email,
                 created_at,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, provider) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = COALESCE(excluded.refresh_token, calendar_connections.refresh_token),
                 expires_at = excluded.expires_at,
                 account_email = COALESCE(excluded.account_email, calendar_connections.account_email),
                 updated_at = excluded.updated_at
             RETURNING user_id, provider, access_token, refresh_token, expires_at,
                       account_email, created_at, updated_at",
        )
        .bind(&params.user_id)
        .bind(params.provider.as_str())
        .bind(&params.access_token)
        .bind(params.refresh_token.as_deref())
        .bind(params.expires_at)
        .bind(params.account_email.as_deref())
        .bind(params.now)
        .bind(params.now)
        .fetch_one(&self.pool)
        .await
        .context("failed to store calendar connection")?;

        Self::map_row(row)
    }

    async fn fetch(
        &self,
        user_id: &str,
        provider: CalendarProviderKind,
    ) -> Result<Option<CalendarConnection>> {
        let row = sqlx::query(
            "SELECT user_id, provider, access_token, refresh_token, expires_at,
                    account_email, created_at, updated_at
             FROM calendar_connections
             WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::map_row).transpose()
    }

    async fn delete(&self, user_id: &str, provider: CalendarProviderKind) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM calendar_connections WHERE user_id = ? AND provider = ?")
                .bind(user_id)
                .bind(provider.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
