//! Slack incoming-webhook notifier.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::Notifier;

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Posts messages to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        if self.webhook_url.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(Duration::from_secs(30))
            .json(&SlackMessage { text: message })
            .send()
            .await
            .context("failed to reach Slack webhook")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!(
                "slack notification failed with status: {}",
                status.as_u16()
            );
        }

        tracing::debug!("Slack notification delivered");
        Ok(())
    }
}
