//! Notifier trait and the local implementations.

use super::Notification;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Delivers notifications to an operator channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Sends and logs a delivery failure instead of returning it.
pub async fn notify_quietly(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.notify(notification).await {
        warn!(error = %e, "Failed to deliver notification");
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        match notification {
            Notification::Escalation {
                kind,
                pool,
                message,
            } => {
                error!(critical = true, kind = %kind, pool = ?pool, message = %message, "Escalation");
            }
            Notification::RebalanceExecuted(r) => {
                info!(
                    pool = %r.pool_name,
                    trigger = %r.trigger_reason,
                    fees_usd = %r.fees_usd,
                    tx_digest = %r.tx_digest,
                    "Rebalance executed"
                );
            }
            other => info!(message = %other.render(), "Notification"),
        }
        Ok(())
    }
}

/// Fans out to several notifiers. Every notifier is tried; the first
/// failure is returned afterwards.
#[derive(Default, Clone)]
pub struct MultiNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl MultiNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(notification).await {
                warn!(error = %e, "Notifier failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
