use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{EventStore, StorageResult};
use crate::database::Database;
use crate::error::StorageError;
use crate::models::event::{duration_nanos, Event};

/// Хранилище в PostgreSQL.
///
/// Каждое изменение - одна условная инструкция: наличие записи проверяется
/// по числу затронутых строк, а не отдельным запросом перед записью.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

// Строка таблицы event; длительность хранится в наносекундах
#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    title: String,
    start_date: DateTime<Utc>,
    duration: i64,
    description: String,
    owner: String,
    remind_at: i64,
    is_send: bool,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            start_date: row.start_date,
            duration: duration_nanos::from_nanos(row.duration),
            description: row.description,
            owner: row.owner,
            remind_at: row.remind_at,
            is_send: row.is_send,
        }
    }
}

const SELECT_EVENTS: &str = "SELECT id, title, start_date, duration, description, owner, remind_at, is_send
     FROM event";

impl PgEventStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn stored_duration(event: &Event) -> StorageResult<i64> {
    duration_nanos::to_nanos(&event.duration).ok_or_else(|| {
        StorageError::Database(sqlx::Error::Encode(
            format!("duration of event {} does not fit into BIGINT nanoseconds", event.id).into(),
        ))
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        let result = sqlx::query(
            "INSERT INTO event (id, title, start_date, duration, description, owner, remind_at, is_send)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.start_date)
        .bind(stored_duration(event)?)
        .bind(&event.description)
        .bind(&event.owner)
        .bind(event.remind_at)
        .bind(event.is_send)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AlreadyExists(event.id.clone()));
        }
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE event
             SET title = $1,
                 start_date = $2,
                 duration = $3,
                 description = $4,
                 owner = $5,
                 remind_at = $6,
                 is_send = $7
             WHERE id = $8",
        )
        .bind(&event.title)
        .bind(event.start_date)
        .bind(stored_duration(event)?)
        .bind(&event.description)
        .bind(&event.owner)
        .bind(event.remind_at)
        .bind(event.is_send)
        .bind(&event.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(event.id.clone()));
        }
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM event WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_events_by_period(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Event>> {
        let sql = format!("{SELECT_EVENTS} WHERE owner = $1 AND start_date >= $2 AND start_date < $3");
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(owner)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn get_events(&self) -> StorageResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(SELECT_EVENTS)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }
}
