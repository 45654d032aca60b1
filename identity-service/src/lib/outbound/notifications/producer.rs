use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;

use crate::config::Config;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::ports::Notifier;
use crate::outbound::notifications::messages::NotificationMessage;
use crate::outbound::notifications::messages::PasswordResetRequestedMessage;
use crate::user::errors::NotifierError;

pub struct KafkaNotificationProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaNotificationProducer {
    /// Create a new Kafka notification producer with "at least once"
    /// delivery semantics
    ///
    /// # Arguments
    /// * `config` - Application configuration
    ///
    /// # Notes:
    /// - `acks=all`: Wait for all in-sync replicas to acknowledge
    /// - `enable.idempotence=true`: Prevents duplicate messages during retries
    /// - `retry.backoff.ms=100`: Backoff between retry attempts
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        tracing::info!(
            "Initializing Kafka producer for notifications: brokers={}, topic={}",
            &config.kafka.brokers,
            &config.kafka.topic
        );

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka.brokers)
            .set("message.timeout.ms", "30000")
            .set("compression.type", "gzip")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "10")
            .set("retry.backoff.ms", "100")
            .create()?;

        tracing::info!("Kafka producer initialized successfully");

        Ok(Self {
            producer,
            topic: config.kafka.topic.to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Publish a notification message, partitioned by recipient so
    /// notifications for the same address stay ordered.
    async fn publish(&self, key: &str, message: &NotificationMessage) -> Result<(), NotifierError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| NotifierError::SerializationFailed(e.to_string()))?;

        tracing::debug!("Publishing notification to topic '{}'", self.topic);

        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| {
                tracing::debug!(
                    "Notification published successfully to topic '{}'",
                    self.topic
                );
            })
            .map_err(|(err, _)| {
                tracing::error!(
                    "Failed to publish notification to Kafka after all retries: {}",
                    err
                );
                NotifierError::PublishFailed(err.to_string())
            })
    }
}

#[async_trait]
impl Notifier for KafkaNotificationProducer {
    async fn send_password_reset(
        &self,
        email: &EmailAddress,
        token: &str,
    ) -> Result<(), NotifierError> {
        let message = NotificationMessage::from(PasswordResetRequestedMessage {
            email: email.as_str().to_string(),
            token: token.to_string(),
            requested_at: Utc::now(),
        });

        self.publish(email.as_str(), &message).await
    }
}
