//! Публикация напоминаний в Kafka.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::KafkaConfig;
use crate::error::PublishError;
use crate::models::Event;

/// Получатель напоминаний. Планировщик зависит только от этого трейта,
/// поэтому в тестах брокер подменяется записывающей реализацией.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Возвращает `Ok` только после подтверждения доставки.
    async fn send_event_message(&self, event: &Event) -> Result<(), PublishError>;
}

pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaProducer {
    /// Идемпотентный продюсер: подтверждение от всех реплик,
    /// до 5 повторов, не больше одного запроса в полёте.
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.service_name)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", "5")
            .set("max.in.flight.requests.per.connection", "1")
            .set("message.timeout.ms", "5000")
            .create()?;

        info!(
            brokers = %config.brokers,
            topic = %config.produce_topic,
            client_id = %config.service_name,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.produce_topic.clone(),
            timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    async fn send_event_message(&self, event: &Event) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event).map_err(|source| PublishError::Serialize {
            id: event.id.clone(),
            source,
        })?;

        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(event.id.as_str());

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                debug!(
                    id = %event.id,
                    topic = %self.topic,
                    partition,
                    offset,
                    "Reminder published"
                );
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!(id = %event.id, topic = %self.topic, error = %kafka_error, "Failed to publish reminder");
                Err(PublishError::Kafka {
                    id: event.id.clone(),
                    topic: self.topic.clone(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}
