use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::session::errors::NotificationError;
use crate::domain::session::models::Notification;
use crate::domain::session::ports::NotificationPublisher;
use crate::domain::session::ports::NotificationQueue;

/// Bounded queue in front of a notification publisher.
///
/// Requests hand notifications off without waiting; a single worker task
/// delivers them and logs failures. Nothing is retried.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Start the delivery worker.
    ///
    /// On shutdown the worker delivers what is already queued, then exits.
    pub fn spawn<NP>(
        publisher: Arc<NP>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>)
    where
        NP: NotificationPublisher,
    {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));

        let handle = tokio::spawn(async move {
            tracing::info!(capacity, "Notification dispatcher started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        receiver.close();
                        while let Some(notification) = receiver.recv().await {
                            deliver(publisher.as_ref(), notification).await;
                        }
                        break;
                    }
                    next = receiver.recv() => match next {
                        Some(notification) => deliver(publisher.as_ref(), notification).await,
                        None => break,
                    },
                }
            }

            tracing::info!("Notification dispatcher stopped");
        });

        (Self { sender }, handle)
    }
}

impl NotificationQueue for NotificationDispatcher {
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender.try_send(notification).map_err(|e| match e {
            TrySendError::Full(dropped) => {
                tracing::warn!(kind = dropped.kind(), "Notification queue full, dropping");
                NotificationError::QueueFull
            }
            TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }
}

async fn deliver<NP>(publisher: &NP, notification: Notification)
where
    NP: NotificationPublisher,
{
    let kind = notification.kind();
    let result = match &notification {
        Notification::Verification { to, name, token } => {
            publisher.send_verification(to, name, token).await
        }
        Notification::PasswordReset { to, name, token } => {
            publisher.send_password_reset(to, name, token).await
        }
    };

    if let Err(e) = result {
        tracing::error!(kind, error = %e, "Failed to deliver notification");
    }
}
