//! Transactional email.
//!
//! Mail is always best effort: callers get an [`EmailOutcome`] back and the
//! request that triggered it never fails because of delivery.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use taskhive_core::config::EmailConfig;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOutcome {
    Sent,
    NotSent(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// JSON-over-HTTP sender for Resend-style APIs (`POST {base}/emails`).
pub struct HttpEmailSender {
    client: Client,
    config: EmailConfig,
}

impl HttpEmailSender {
    pub fn new(client: Client, config: EmailConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/emails", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&OutgoingEmail {
                from: &self.config.from,
                to: [message.to.as_str()],
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await
            .context("request email api")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_owned());
            return Err(anyhow!("email api error {status}: {body}"));
        }

        Ok(())
    }
}

/// Wraps an optional sender and swallows every failure.
#[derive(Clone, Default)]
pub struct Mailer {
    sender: Option<Arc<dyn EmailSender>>,
}

impl Mailer {
    pub fn new(sender: Option<Arc<dyn EmailSender>>) -> Self {
        Self { sender }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub async fn send(&self, message: EmailMessage) -> EmailOutcome {
        let Some(sender) = self.sender.as_ref() else {
            return EmailOutcome::NotSent("email is not configured".to_owned());
        };

        match sender.send(&message).await {
            Ok(()) => {
                info!(to = %message.to, subject = %message.subject, "email sent");
                EmailOutcome::Sent
            }
            Err(error) => {
                warn!(?error, to = %message.to, "email delivery failed");
                EmailOutcome::NotSent(error.to_string())
            }
        }
    }

    pub async fn send_welcome(&self, to: &str, name: Option<&str>) -> EmailOutcome {
        let greeting = name.map_or_else(|| "Hi".to_owned(), |name| format!("Hi {name}"));
        self.send(EmailMessage {
            to: to.to_owned(),
            subject: "Welcome to Taskhive".to_owned(),
            text: format!(
                "{greeting},\n\nYour account is ready. Your personal workspace has been created."
            ),
        })
        .await
    }

    pub async fn send_member_added(
        &self,
        to: &str,
        workspace_name: &str,
        role: &str,
        invited_by: &str,
    ) -> EmailOutcome {
        self.send(EmailMessage {
            to: to.to_owned(),
            subject: format!("You were added to {workspace_name}"),
            text: format!(
                "{invited_by} added you to the workspace \"{workspace_name}\" as {role}."
            ),
        })
        .await
    }
}
