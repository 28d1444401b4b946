//! Сервисный слой календаря.
//!
//! Единственная точка, через которую HTTP-слой работает с событиями:
//! валидация, выдача идентификаторов, сброс флага отправки напоминания
//! и вычисление окон день/неделя/месяц.

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::event::{Event, MAX_FIELD_LENGTH};
use crate::storage::EventStore;

#[derive(Clone)]
pub struct Calendar {
    store: Arc<dyn EventStore>,
}

impl Calendar {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Проверяет событие, при необходимости выдаёт id и сохраняет.
    /// Новое событие всегда ждёт отправки напоминания.
    pub async fn create_event(&self, mut event: Event) -> Result<Event, AppError> {
        validate_event(&event)?;

        if event.id.is_empty() {
            event.id = new_event_id();
        }
        event.is_send = false;
        event.truncate_start_date();

        self.store.create_event(&event).await?;
        info!(id = %event.id, owner = %event.owner, "Event created");
        Ok(event)
    }

    /// Полностью заменяет событие. Любое изменение заново взводит напоминание.
    pub async fn update_event(&self, mut event: Event) -> Result<Event, AppError> {
        if event.id.is_empty() {
            return Err(AppError::MissingId);
        }
        validate_event(&event)?;

        event.is_send = false;
        event.truncate_start_date();

        self.store.update_event(&event).await?;
        info!(id = %event.id, owner = %event.owner, "Event updated");
        Ok(event)
    }

    pub async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        self.store.delete_event(id).await?;
        info!(id = %id, "Event deleted");
        Ok(())
    }

    pub async fn get_events_day(&self, owner: &str) -> Result<Vec<Event>, AppError> {
        self.get_events_day_at(owner, Utc::now()).await
    }

    pub async fn get_events_week(&self, owner: &str) -> Result<Vec<Event>, AppError> {
        self.get_events_week_at(owner, Utc::now()).await
    }

    pub async fn get_events_month(&self, owner: &str) -> Result<Vec<Event>, AppError> {
        self.get_events_month_at(owner, Utc::now()).await
    }

    pub async fn get_events_day_at(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Event>, AppError> {
        self.get_events_in(owner, day_window(now)).await
    }

    pub async fn get_events_week_at(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Event>, AppError> {
        self.get_events_in(owner, week_window(now)).await
    }

    pub async fn get_events_month_at(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Event>, AppError> {
        self.get_events_in(owner, month_window(now)).await
    }

    async fn get_events_in(
        &self,
        owner: &str,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Vec<Event>, AppError> {
        debug!(owner = %owner, %start, %end, "Querying events by period");
        Ok(self.store.get_events_by_period(owner, start, end).await?)
    }
}

pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}

/// Возвращает первое нарушенное правило в порядке:
/// owner, title, duration, startDate.
pub fn validate_event(event: &Event) -> Result<(), AppError> {
    let Err(errors) = event.validate() else {
        return Ok(());
    };
    let failed = errors.field_errors();

    if failed.contains_key("owner") {
        return Err(length_error("owner", &event.owner));
    }
    if failed.contains_key("title") {
        return Err(length_error("title", &event.title));
    }
    if failed.contains_key("duration") {
        return Err(AppError::validation("duration", "duration is required"));
    }
    if failed.contains_key("start_date") {
        return Err(AppError::validation("startDate", "startDate is required"));
    }

    Err(AppError::validation("event", errors.to_string()))
}

fn length_error(field: &'static str, value: &str) -> AppError {
    if value.is_empty() {
        AppError::validation(field, format!("{field} is required"))
    } else {
        AppError::validation(
            field,
            format!("{field} length can't be greater than {MAX_FIELD_LENGTH}"),
        )
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Текущие сутки UTC: [00:00, 00:00 следующего дня).
pub fn day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = midnight(now.date_naive());
    (start, start + Duration::days(1))
}

/// Семидневное окно, начинающееся в понедельник 00:00 UTC.
pub fn week_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let monday = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
    let start = midnight(monday);
    (start, start + Duration::days(7))
}

/// С первого числа текущего месяца до первого числа следующего.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let first = today - Days::new(u64::from(today.day0()));
    let next = first
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (midnight(first), midnight(next))
}
