use chrono::{DateTime, Months, Utc};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::storage::{EventStore, StorageResult};
use crate::services::producer::EventPublisher;

/// Разбирает cron-выражение. Классическая пятипольная запись crontab
/// дополняется нулевыми секундами, а её дни недели (0 и 7 - воскресенье,
/// 1 - понедельник) переводятся в имена. Шесть и более полей передаются
/// как есть, в нумерации крейта cron (1 - воскресенье).
pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day, month, weekday] => Schedule::from_str(&format!(
            "0 {minute} {hour} {day} {month} {}",
            crontab_weekdays(weekday)
        )),
        _ => Schedule::from_str(expression.trim()),
    }
}

fn crontab_weekdays(field: &str) -> String {
    const NAMES: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    let mut mapped = String::with_capacity(field.len());
    let mut after_step = false;
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_ascii_digit() {
            after_step = c == '/';
            mapped.push(c);
            continue;
        }

        let mut number = String::from(c);
        while let Some(digit) = chars.next_if(char::is_ascii_digit) {
            number.push(digit);
        }
        // шаг после '/' остаётся числом
        match number.parse::<usize>().ok().and_then(|n| NAMES.get(n)) {
            Some(name) if !after_step => mapped.push_str(name),
            _ => mapped.push_str(&number),
        }
    }
    mapped
}

/// Удаляет события, начавшиеся больше календарного года назад.
/// Ошибка удаления одного события не прерывает обход.
pub async fn purge_expired(store: &dyn EventStore, now: DateTime<Utc>) -> StorageResult<usize> {
    let threshold = now.checked_sub_months(Months::new(12)).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let events = store.get_events().await?;

    let mut purged = 0;
    for event in events.iter().filter(|e| e.start_date < threshold) {
        match store.delete_event(&event.id).await {
            Ok(()) => purged += 1,
            Err(e) => error!("🗑️ Failed to delete expired event {}: {}", event.id, e),
        }
    }

    if purged == 0 {
        info!("🗑️ No expired events to purge");
    } else {
        info!("🗑️ Purged {} events older than {}", purged, threshold);
    }
    Ok(purged)
}

/// Публикует наступившие напоминания и помечает их отправленными.
/// При ошибке публикации напоминание остаётся в ожидании до следующего запуска.
pub async fn dispatch_reminders(
    store: &dyn EventStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> StorageResult<usize> {
    let events = store.get_events().await?;

    let mut dispatched = 0;
    for mut event in events.into_iter().filter(|e| e.is_reminder_due(now)) {
        if let Err(e) = publisher.send_event_message(&event).await {
            warn!("🔔 Reminder for event {} left pending: {}", event.id, e);
            continue;
        }

        event.is_send = true;
        match store.update_event(&event).await {
            Ok(()) => {
                dispatched += 1;
                info!("🔔 Reminder sent for event {} ({})", event.id, event.owner);
            }
            Err(e) => error!("🔔 Failed to mark event {} as sent: {}", event.id, e),
        }
    }

    Ok(dispatched)
}

pub struct Scheduler {
    store: Arc<dyn EventStore>,
    publisher: Arc<dyn EventPublisher>,
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn EventStore>,
        publisher: Arc<dyn EventPublisher>,
        expression: &str,
    ) -> Result<Self, cron::error::Error> {
        Ok(Self {
            store,
            publisher,
            schedule: parse_schedule(expression)?,
        })
    }

    /// Запускает очистку и рассылку двумя независимыми задачами.
    pub fn start(&self, token: CancellationToken) -> Vec<JoinHandle<()>> {
        let store = self.store.clone();
        let purge = task::spawn(run_job("purge", self.schedule.clone(), token.clone(), move || {
            let store = store.clone();
            async move {
                if let Err(e) = purge_expired(store.as_ref(), Utc::now()).await {
                    error!("🗑️ Purge run failed: {}", e);
                }
            }
        }));

        let store = self.store.clone();
        let publisher = self.publisher.clone();
        let dispatch = task::spawn(run_job("dispatch", self.schedule.clone(), token, move || {
            let store = store.clone();
            let publisher = publisher.clone();
            async move {
                if let Err(e) = dispatch_reminders(store.as_ref(), publisher.as_ref(), Utc::now()).await {
                    error!("🔔 Reminder run failed: {}", e);
                }
            }
        }));

        vec![purge, dispatch]
    }
}

async fn run_job<F, Fut>(name: &'static str, schedule: Schedule, token: CancellationToken, job: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    info!("⏰ Job {} scheduled", name);

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!("⏰ Schedule for job {} has no upcoming runs", name);
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(wait) => {}
        }

        // Прерванный запуск доделает следующий: отправленные, но не
        // отмеченные напоминания уйдут повторно
        tokio::select! {
            _ = token.cancelled() => {
                warn!("⏰ Job {} interrupted by shutdown", name);
                break;
            }
            _ = job() => {}
        }
    }

    info!("⏰ Job {} stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::models::Event;
    use crate::storage::MemoryEventStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    struct SlowPublisher {
        delay: std::time::Duration,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for SlowPublisher {
        async fn send_event_message(&self, _event: &Event) -> Result<(), PublishError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn send_event_message(&self, event: &Event) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Kafka {
                    id: event.id.clone(),
                    topic: "reminders".into(),
                    reason: "broker unavailable".into(),
                });
            }
            self.sent.lock().unwrap().push(event.id.clone());
            Ok(())
        }
    }

    fn event(id: &str, start_date: DateTime<Utc>, remind_at: i64) -> Event {
        Event {
            id: id.into(),
            title: "meeting".into(),
            start_date,
            duration: Duration::hours(1),
            description: String::new(),
            owner: "alice".into(),
            remind_at,
            is_send: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn five_field_expression_gets_seconds() {
        let schedule = parse_schedule("*/5 * * * *").unwrap();
        let next = schedule.after(&now()).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 16, 12, 5, 0).unwrap());
    }

    #[test]
    fn six_field_expression_is_used_as_is() {
        let schedule = parse_schedule("30 * * * * *").unwrap();
        let next = schedule.after(&now()).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 30).unwrap());
    }

    #[test]
    fn crontab_weekdays_count_from_sunday_zero() {
        // now() - пятница 2026-10-16
        let sunday = parse_schedule("0 9 * * 0").unwrap();
        assert_eq!(
            sunday.after(&now()).next().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
        );

        let also_sunday = parse_schedule("0 9 * * 7").unwrap();
        assert_eq!(
            also_sunday.after(&now()).next().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
        );

        let monday = parse_schedule("* * * * 1").unwrap();
        assert_eq!(
            monday.after(&now()).next().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
        );

        let workdays = parse_schedule("30 8 * * 1-5").unwrap();
        assert_eq!(
            workdays.after(&now()).next().unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
        );
    }

    #[test]
    fn weekday_steps_and_lists_are_mapped() {
        assert_eq!(crontab_weekdays("*"), "*");
        assert_eq!(crontab_weekdays("0,6"), "Sun,Sat");
        assert_eq!(crontab_weekdays("1-5/2"), "Mon-Fri/2");
        assert_eq!(crontab_weekdays("*/2"), "*/2");
        assert_eq!(crontab_weekdays("Mon"), "Mon");
    }

    #[test]
    fn rejects_garbage_expression() {
        assert!(parse_schedule("every minute").is_err());
    }

    #[tokio::test]
    async fn purges_only_events_older_than_a_year() {
        let store = MemoryEventStore::new();
        store.create_event(&event("old", now() - Duration::days(400), 0)).await.unwrap();
        store.create_event(&event("recent", now() - Duration::days(300), 0)).await.unwrap();

        let purged = purge_expired(&store, now()).await.unwrap();

        assert_eq!(purged, 1);
        let left: Vec<String> = store.get_events().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(left, vec!["recent".to_string()]);
    }

    #[tokio::test]
    async fn dispatches_due_reminder_once() {
        let store = MemoryEventStore::new();
        let publisher = RecordingPublisher::default();
        // начало через 5 минут, напомнить за 10
        store.create_event(&event("due", now() + Duration::minutes(5), 10)).await.unwrap();

        assert_eq!(dispatch_reminders(&store, &publisher, now()).await.unwrap(), 1);
        assert_eq!(dispatch_reminders(&store, &publisher, now()).await.unwrap(), 0);

        assert_eq!(*publisher.sent.lock().unwrap(), vec!["due".to_string()]);
        assert!(store.get_events().await.unwrap()[0].is_send);
    }

    #[tokio::test]
    async fn leaves_future_reminder_pending() {
        let store = MemoryEventStore::new();
        let publisher = RecordingPublisher::default();
        store.create_event(&event("later", now() + Duration::hours(2), 10)).await.unwrap();

        assert_eq!(dispatch_reminders(&store, &publisher, now()).await.unwrap(), 0);
        assert!(publisher.sent.lock().unwrap().is_empty());
        assert!(!store.get_events().await.unwrap()[0].is_send);
    }

    #[tokio::test]
    async fn failed_publish_keeps_reminder_pending() {
        let store = MemoryEventStore::new();
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };
        store.create_event(&event("due", now(), 0)).await.unwrap();

        assert_eq!(dispatch_reminders(&store, &publisher, now()).await.unwrap(), 0);
        assert!(!store.get_events().await.unwrap()[0].is_send);
    }

    #[tokio::test]
    async fn jobs_stop_on_cancellation() {
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
        let publisher: Arc<dyn EventPublisher> = Arc::new(RecordingPublisher::default());
        let scheduler = Scheduler::new(store, publisher, "0 0 1 1 *").unwrap();
        let token = CancellationToken::new();

        let handles = scheduler.start(token.clone());
        token.cancel();

        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn running_dispatch_stops_on_cancellation() {
        let store = Arc::new(MemoryEventStore::new());
        for i in 0..10 {
            store
                .create_event(&event(&format!("due-{i}"), Utc::now(), 0))
                .await
                .unwrap();
        }
        let publisher = Arc::new(SlowPublisher {
            delay: std::time::Duration::from_secs(1),
            calls: Default::default(),
        });
        let scheduler = Scheduler::new(store.clone(), publisher.clone(), "* * * * * *").unwrap();
        let token = CancellationToken::new();

        let handles = scheduler.start(token.clone());
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(publisher.calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
        token.cancel();

        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_millis(500), handle)
                .await
                .expect("job did not stop promptly after cancellation")
                .unwrap();
        }
        let sent = store.get_events().await.unwrap().into_iter().filter(|e| e.is_send).count();
        assert!(sent < 10);
    }
}
