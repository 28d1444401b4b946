//! Хранилище событий: общий контракт и две реализации (память, PostgreSQL).

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::Event;

pub use memory::MemoryEventStore;
pub use sql::PgEventStore;

pub type StorageResult<T> = Result<T, StorageError>;

/// Контракт хранилища. Обе реализации ведут себя одинаково;
/// вызывающий получает копии записей, а не ссылки внутрь хранилища.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// `AlreadyExists`, если событие с таким id уже есть.
    async fn create_event(&self, event: &Event) -> StorageResult<()>;

    /// Полная замена записи. `NotFound`, если id неизвестен.
    async fn update_event(&self, event: &Event) -> StorageResult<()>;

    async fn delete_event(&self, id: &str) -> StorageResult<()>;

    /// События владельца с `start <= start_date < end`, порядок не задан.
    async fn get_events_by_period(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>>;

    /// Все события. Нужно только планировщику для полного обхода.
    async fn get_events(&self) -> StorageResult<Vec<Event>>;
}
