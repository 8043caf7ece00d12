//! Outbound run notifications.
//!
//! A notifier delivers one human-readable message per backup run. Delivery
//! failures are reported to the caller, which logs them; they never change
//! the outcome of the run.

mod slack;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use slack::SlackNotifier;

/// Capability contract for delivering a run message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// A boxed notifier for dynamic dispatch.
pub type BoxedNotifier = Box<dyn Notifier>;

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub slack_webhook_url: String,
}

/// Build the configured notifier, or `None` when nothing is configured.
///
/// With `None` the pipeline makes no outbound calls at all.
pub fn notifier_from_config(config: &NotifyConfig) -> Option<BoxedNotifier> {
    let url = config.slack_webhook_url.trim();
    if url.is_empty() {
        tracing::debug!("No notification target configured");
        return None;
    }
    Some(Box::new(SlackNotifier::new(url)))
}
