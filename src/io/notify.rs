//! Citizen notifications
//!
//! Financial operations post messages to an [`Outbox`] and move on. A worker
//! task drains the outbox and hands each message to a [`NotificationSink`]
//! under a timeout. Delivery failures are logged and dropped; they never reach
//! the operation that posted the message.

use crate::core::traits::OwnerIdentity;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: OwnerIdentity,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        recipient: OwnerIdentity,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Notification {
            recipient,
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("owner {owner} has no notification address")]
    NoAddress { owner: u32 },

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Messaging transport
pub trait NotificationSink: Send + Sync + 'static {
    fn deliver(&self, notification: Notification) -> BoxFuture<'static, Result<(), DeliveryError>>;
}

/// Writes notifications to the log instead of a chat transport
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: Notification) -> BoxFuture<'static, Result<(), DeliveryError>> {
        async move {
            tracing::info!(
                owner = notification.recipient.owner,
                name = %notification.recipient.name,
                title = %notification.title,
                body = %notification.body,
                "Notification"
            );
            Ok(())
        }
        .boxed()
    }
}

/// Keeps every delivered notification in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: Notification) -> BoxFuture<'static, Result<(), DeliveryError>> {
        let delivered = Arc::clone(&self.delivered);
        async move {
            delivered.lock().push(notification);
            Ok(())
        }
        .boxed()
    }
}

/// Sending half of the notification channel
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Outbox {
    /// An outbox that drops everything posted to it
    pub fn disabled() -> Self {
        Outbox { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a notification; never fails
    pub fn post(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(rejected) = tx.send(notification) {
            tracing::warn!(
                owner = rejected.0.recipient.owner,
                title = %rejected.0.title,
                "Notification worker has stopped, dropping message"
            );
        }
    }
}

/// Start the delivery worker on the current tokio runtime
///
/// The worker runs until every clone of the returned [`Outbox`] is dropped and
/// resolves to the number of notifications delivered successfully.
pub fn spawn_worker(
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
) -> (Outbox, JoinHandle<usize>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

    let handle = tokio::spawn(async move {
        let mut delivered = 0usize;
        while let Some(notification) = rx.recv().await {
            let owner = notification.recipient.owner;
            match tokio::time::timeout(timeout, sink.deliver(notification)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(error)) => {
                    tracing::warn!(owner, error = %error, "Notification delivery failed");
                }
                Err(_) => {
                    tracing::warn!(
                        owner,
                        timeout_ms = timeout.as_millis() as u64,
                        "Notification delivery timed out"
                    );
                }
            }
        }
        tracing::debug!(delivered, "Notification worker finished");
        delivered
    });

    (Outbox { tx: Some(tx) }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(owner: u32) -> OwnerIdentity {
        OwnerIdentity {
            owner,
            name: format!("Citizen {}", owner),
            notify_address: None,
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn deliver(
            &self,
            notification: Notification,
        ) -> BoxFuture<'static, Result<(), DeliveryError>> {
            async move {
                Err(DeliveryError::NoAddress {
                    owner: notification.recipient.owner,
                })
            }
            .boxed()
        }
    }

    struct StalledSink;

    impl NotificationSink for StalledSink {
        fn deliver(
            &self,
            _notification: Notification,
        ) -> BoxFuture<'static, Result<(), DeliveryError>> {
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let sink = RecordingSink::new();
        let (outbox, worker) = spawn_worker(Arc::new(sink.clone()), Duration::from_secs(1));

        outbox.post(Notification::new(identity(1), "Transfer received", "You received 300.00"));
        outbox.post(Notification::new(identity(2), "Loan approved", "5500.00 credited"));
        drop(outbox);

        assert_eq!(worker.await.unwrap(), 2);
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].title, "Transfer received");
        assert_eq!(delivered[1].recipient.owner, 2);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let (outbox, worker) = spawn_worker(Arc::new(FailingSink), Duration::from_secs(1));
        outbox.post(Notification::new(identity(1), "Late fee", "60.00 charged"));
        drop(outbox);
        assert_eq!(worker.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stalled_delivery_times_out() {
        let (outbox, worker) = spawn_worker(Arc::new(StalledSink), Duration::from_millis(10));
        outbox.post(Notification::new(identity(1), "Lottery win", "25000.00"));
        outbox.post(Notification::new(identity(2), "Lottery win", "25000.00"));
        drop(outbox);
        assert_eq!(worker.await.unwrap(), 0);
    }

    #[test]
    fn test_disabled_outbox_drops_silently() {
        let outbox = Outbox::disabled();
        assert!(!outbox.is_enabled());
        outbox.post(Notification::new(identity(1), "ignored", ""));
    }
}
