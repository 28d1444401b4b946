//! Напоминание от создания события до повторного чтения из брокера.

use async_trait::async_trait;
use calendar::{
    error::PublishError,
    models::Event,
    services::{
        calendar::Calendar,
        consumer::{consume_message, ConsumeOutcome},
        producer::EventPublisher,
        scheduler::{dispatch_reminders, purge_expired},
    },
    storage::{EventStore, MemoryEventStore},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Брокер в памяти: хранит сериализованные сообщения в порядке отправки.
#[derive(Default)]
struct InMemoryTopic {
    messages: Mutex<Vec<Vec<u8>>>,
}

impl InMemoryTopic {
    fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

#[async_trait]
impl EventPublisher for InMemoryTopic {
    async fn send_event_message(&self, event: &Event) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event).map_err(|source| PublishError::Serialize {
            id: event.id.clone(),
            source,
        })?;
        self.messages.lock().unwrap().push(payload);
        Ok(())
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

fn standup() -> Event {
    Event {
        id: String::new(),
        title: "standup".into(),
        start_date: start(),
        duration: Duration::minutes(15),
        description: String::new(),
        owner: "alice".into(),
        remind_at: 10,
        is_send: false,
    }
}

#[tokio::test]
async fn reminder_is_dispatched_once_and_consumed_idempotently() {
    let store = Arc::new(MemoryEventStore::new());
    let topic = InMemoryTopic::default();
    let calendar = Calendar::new(store.clone());

    let created = calendar.create_event(standup()).await.unwrap();

    // за 11 минут до начала напоминать ещё рано
    let early = start() - Duration::minutes(11);
    assert_eq!(dispatch_reminders(store.as_ref(), &topic, early).await.unwrap(), 0);

    let tick = start() - Duration::minutes(10);
    assert_eq!(dispatch_reminders(store.as_ref(), &topic, tick).await.unwrap(), 1);

    let messages = topic.drain();
    assert_eq!(messages.len(), 1);
    let published: Event = serde_json::from_slice(&messages[0]).unwrap();
    assert_eq!(published.id, created.id);
    assert_eq!(published.owner, "alice");

    // сообщение возвращается в то же хранилище
    let outcome = consume_message(store.as_ref(), Some(messages[0].as_slice())).await.unwrap();
    assert_eq!(outcome, ConsumeOutcome::Duplicate(created.id.clone()));

    let stored = store.get_events().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_send);

    let second_tick = start() - Duration::minutes(1);
    assert_eq!(dispatch_reminders(store.as_ref(), &topic, second_tick).await.unwrap(), 0);
    assert!(topic.drain().is_empty());
}

#[tokio::test]
async fn editing_a_sent_event_rearms_its_reminder() {
    let store = Arc::new(MemoryEventStore::new());
    let topic = InMemoryTopic::default();
    let calendar = Calendar::new(store.clone());

    let created = calendar.create_event(standup()).await.unwrap();
    let tick = start() - Duration::minutes(5);
    assert_eq!(dispatch_reminders(store.as_ref(), &topic, tick).await.unwrap(), 1);

    let sent = store.get_events().await.unwrap().remove(0);
    assert!(sent.is_send);

    calendar
        .update_event(Event {
            description: "moved to the big room".into(),
            ..sent
        })
        .await
        .unwrap();

    assert_eq!(dispatch_reminders(store.as_ref(), &topic, tick).await.unwrap(), 1);
    let messages = topic.drain();
    assert_eq!(messages.len(), 2);
    let last: Event = serde_json::from_slice(&messages[1]).unwrap();
    assert_eq!(last.id, created.id);
    assert_eq!(last.description, "moved to the big room");
}

#[tokio::test]
async fn consumer_fills_a_separate_store_from_the_topic() {
    let source = Arc::new(MemoryEventStore::new());
    let archive = MemoryEventStore::new();
    let topic = InMemoryTopic::default();
    let calendar = Calendar::new(source.clone());

    for title in ["standup", "retro", "planning"] {
        calendar
            .create_event(Event {
                title: title.into(),
                ..standup()
            })
            .await
            .unwrap();
    }

    assert_eq!(dispatch_reminders(source.as_ref(), &topic, start()).await.unwrap(), 3);

    for message in topic.drain() {
        let outcome = consume_message(&archive, Some(message.as_slice())).await.unwrap();
        assert!(matches!(outcome, ConsumeOutcome::Created(_)));
    }

    let mut titles: Vec<String> = archive.get_events().await.unwrap().into_iter().map(|e| e.title).collect();
    titles.sort();
    assert_eq!(titles, vec!["planning", "retro", "standup"]);
}

#[tokio::test]
async fn purge_and_dispatch_work_on_the_same_store() {
    let store = Arc::new(MemoryEventStore::new());
    let topic = InMemoryTopic::default();
    let calendar = Calendar::new(store.clone());
    let now = start();

    calendar
        .create_event(Event {
            start_date: now - Duration::days(400),
            ..standup()
        })
        .await
        .unwrap();
    let recent = calendar
        .create_event(Event {
            start_date: now - Duration::days(300),
            ..standup()
        })
        .await
        .unwrap();

    assert_eq!(purge_expired(store.as_ref(), now).await.unwrap(), 1);

    let left = store.get_events().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, recent.id);

    // прошедшее событие с неотправленным напоминанием всё равно уходит
    assert_eq!(dispatch_reminders(store.as_ref(), &topic, now).await.unwrap(), 1);
}
