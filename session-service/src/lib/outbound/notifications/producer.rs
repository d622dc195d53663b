use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;
use thiserror::Error;

use crate::config::KafkaConfig;
use crate::domain::principal::models::EmailAddress;
use crate::domain::session::errors::NotificationError;
use crate::domain::session::ports::NotificationPublisher;
use crate::outbound::notifications::messages::MailRequest;
use crate::outbound::notifications::messages::NotificationMessage;

#[derive(Debug, Error)]
pub enum KafkaProducerError {
    #[error("Failed to send message to Kafka: {0}")]
    SendError(String),

    #[error("Failed to serialize message: {0}")]
    SerializationError(String),
}

impl From<KafkaProducerError> for NotificationError {
    fn from(err: KafkaProducerError) -> Self {
        match err {
            KafkaProducerError::SerializationError(msg) => {
                NotificationError::SerializationFailed(msg)
            }
            KafkaProducerError::SendError(msg) => NotificationError::PublishFailed(msg),
        }
    }
}

/// Publishes mailer requests to a Kafka topic.
pub struct KafkaNotificationProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaNotificationProducer {
    /// Create a new Kafka producer with "at least once" delivery semantics
    ///
    /// # Notes:
    /// - `acks=all`: Wait for all in-sync replicas to acknowledge
    /// - `enable.idempotence=true`: Prevents duplicate messages during retries
    pub fn new(config: &KafkaConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(
            brokers = %config.brokers,
            topic = %config.notification_topic,
            "Initializing Kafka producer for notifications"
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "30000")
            .set("compression.type", "gzip")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "10")
            .set("retry.backoff.ms", "100")
            .create()?;

        Ok(Self {
            producer,
            topic: config.notification_topic.clone(),
            timeout: Duration::from_secs(30),
        })
    }

    async fn publish(&self, message: &NotificationMessage) -> Result<(), KafkaProducerError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| KafkaProducerError::SerializationError(e.to_string()))?;

        let record = FutureRecord::to(&self.topic)
            .key(message.recipient())
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| {
                tracing::debug!(topic = %self.topic, "Notification published");
            })
            .map_err(|(err, _)| KafkaProducerError::SendError(err.to_string()))
    }
}

#[async_trait]
impl NotificationPublisher for KafkaNotificationProducer {
    async fn send_verification(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), NotificationError> {
        let message = NotificationMessage::EmailVerification(MailRequest::new(to, name, token));
        self.publish(&message).await.map_err(Into::into)
    }

    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), NotificationError> {
        let message = NotificationMessage::PasswordReset(MailRequest::new(to, name, token));
        self.publish(&message).await.map_err(Into::into)
    }
}
