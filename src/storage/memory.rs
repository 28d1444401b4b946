use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{EventStore, StorageResult};
use crate::error::StorageError;
use crate::models::Event;

/// Хранилище в памяти. Одна блокировка на всю карту: проверка
/// существования и изменение выполняются под одним захватом.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        let mut events = self.events.write().await;

        if events.contains_key(&event.id) {
            return Err(StorageError::AlreadyExists(event.id.clone()));
        }

        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> StorageResult<()> {
        let mut events = self.events.write().await;

        match events.get_mut(&event.id) {
            Some(stored) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(event.id.clone())),
        }
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        let mut events = self.events.write().await;

        events
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_events_by_period(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>> {
        let events = self.events.read().await;

        Ok(events
            .values()
            .filter(|e| e.owner == owner && e.start_date >= start && e.start_date < end)
            .cloned()
            .collect())
    }

    async fn get_events(&self) -> StorageResult<Vec<Event>> {
        let events = self.events.read().await;
        Ok(events.values().cloned().collect())
    }
}
