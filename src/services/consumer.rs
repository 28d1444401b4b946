//! Приём событий из Kafka и сохранение их в хранилище.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::{ConsumeError, StorageError};
use crate::models::Event;
use crate::services::calendar::{new_event_id, validate_event};
use crate::storage::EventStore;

/// Итог обработки одного сообщения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Created(String),
    /// Событие с таким id уже сохранено (повторная доставка).
    Duplicate(String),
}

/// Декодирует событие из JSON, проверяет его и сохраняет
/// как новое: напоминание всегда ждёт отправки.
pub async fn consume_message(
    store: &dyn EventStore,
    payload: Option<&[u8]>,
) -> Result<ConsumeOutcome, ConsumeError> {
    let payload = match payload {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(ConsumeError::EmptyPayload),
    };

    let mut event: Event = serde_json::from_slice(payload)?;
    validate_event(&event)?;

    if event.id.is_empty() {
        event.id = new_event_id();
    }
    event.is_send = false;
    event.truncate_start_date();

    match store.create_event(&event).await {
        Ok(()) => Ok(ConsumeOutcome::Created(event.id)),
        Err(StorageError::AlreadyExists(id)) => Ok(ConsumeOutcome::Duplicate(id)),
        Err(err) => Err(err.into()),
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
    store: Arc<dyn EventStore>,
    topic: String,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig, store: Arc<dyn EventStore>) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group)
            .set("client.id", &config.service_name)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.consume_topic.as_str()])?;

        info!(
            brokers = %config.brokers,
            group = %config.group,
            topic = %config.consume_topic,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            store,
            topic: config.consume_topic.clone(),
        })
    }

    /// Читает сообщения до отмены токена. Смещение фиксируется только
    /// после успешного сохранения; ошибки логируются, сообщение пропускается.
    pub async fn run(self, token: CancellationToken) {
        info!(topic = %self.topic, "Consumer started");

        loop {
            let message = tokio::select! {
                _ = token.cancelled() => break,
                received = self.consumer.recv() => received,
            };

            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    error!(error = %e, "Failed to receive message");
                    continue;
                }
            };

            match consume_message(self.store.as_ref(), message.payload()).await {
                Ok(outcome) => {
                    match &outcome {
                        ConsumeOutcome::Created(id) => info!(id = %id, "Event stored from message"),
                        ConsumeOutcome::Duplicate(id) => debug!(id = %id, "Event already stored, skipping"),
                    }
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        warn!(
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Failed to commit offset"
                        );
                    }
                }
                Err(e) => {
                    error!(
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Failed to handle message"
                    );
                }
            }
        }

        info!("Consumer stopped");
    }
}
