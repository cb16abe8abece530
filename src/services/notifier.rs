//! Lifecycle event delivery

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::{
    config::NotificationsConfig,
    error::{AppError, AppResult},
    models::event::LifecycleEvent,
};

/// Receives lifecycle events after a transition commits.
///
/// Errors are reported back to the engine, which logs them as warnings;
/// they never undo a transition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: &LifecycleEvent) -> AppResult<()>;
}

/// Writes every event to the log
#[derive(Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn emit(&self, event: &LifecycleEvent) -> AppResult<()> {
        tracing::info!(
            rental_id = %event.rental_id,
            equipment_id = %event.equipment_id,
            from = %event.previous_status,
            to = %event.new_status,
            "Rental lifecycle event"
        );
        Ok(())
    }
}

/// Realtime change feed backed by a broadcast channel
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn emit(&self, event: &LifecycleEvent) -> AppResult<()> {
        // No subscribers is not a failure
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(rental_id = %event.rental_id, "No realtime subscribers");
        }
        Ok(())
    }
}

/// POSTs each event as JSON to a configured URL
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build webhook client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit(&self, event: &LifecycleEvent) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Webhook answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Delivers to every inner notifier, even when some of them fail
#[derive(Clone, Default)]
pub struct FanOutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanOutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Standard set: log, realtime feed, and the webhook when configured
    pub fn from_config(config: &NotificationsConfig, feed: BroadcastNotifier) -> AppResult<Self> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(TracingNotifier), Arc::new(feed)];
        if let Some(url) = &config.webhook_url {
            notifiers.push(Arc::new(WebhookNotifier::new(url.clone(), config.webhook_timeout)?));
        }
        Ok(Self::new(notifiers))
    }
}

#[async_trait]
impl Notifier for FanOutNotifier {
    async fn emit(&self, event: &LifecycleEvent) -> AppResult<()> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.emit(event).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Notification(failures.join("; ")))
        }
    }
}
