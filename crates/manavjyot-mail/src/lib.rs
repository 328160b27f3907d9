//! Outbound email. Delivery is an external concern reached through the
//! [`Mailer`] trait; callers decide whether a failed send matters.

pub mod templates;

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building mail HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .with_context(|| format!("sending mail to {}", email.to))?
            .error_for_status()
            .with_context(|| format!("mail relay rejected message to {}", email.to))?;

        info!("Mail '{}' sent to {}", email.subject, email.to);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them. Used when no relay
/// is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "Mail relay not configured, message body follows:\n{}",
            email.text
        );
        Ok(())
    }
}

/// Keeps sent messages in memory. Can be switched to fail every send.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<Email>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            outbox: Mutex::default(),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.outbox.lock().map(|outbox| outbox.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        if self.failing {
            return Err(anyhow!("mail delivery to {} failed", email.to));
        }
        self.outbox
            .lock()
            .map_err(|e| anyhow!("outbox lock poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }
}
