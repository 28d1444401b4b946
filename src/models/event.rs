use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 0001-01-01T00:00:00Z в секундах Unix: "пустая" дата начала.
const ZERO_DATE_TIMESTAMP: i64 = -62_135_596_800;

pub const MAX_FIELD_LENGTH: u64 = 256;

/// Календарное событие. Единственная доменная сущность сервиса.
///
/// `start_date` всегда в UTC: метки времени с любым смещением приводятся
/// к UTC при десериализации.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[serde(default = "zero_date")]
    #[validate(custom(function = "validate_start_date"))]
    pub start_date: DateTime<Utc>,
    #[serde(default = "Duration::zero", with = "duration_nanos")]
    #[validate(custom(function = "validate_duration"))]
    pub duration: Duration,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 256))]
    pub owner: String,
    /// За сколько минут до начала отправить напоминание.
    #[serde(default)]
    pub remind_at: i64,
    #[serde(default)]
    pub is_send: bool,
}

impl Event {
    /// Обрезает начало до микросекунд: точнее TIMESTAMPTZ не хранит,
    /// а оба хранилища должны возвращать одно и то же.
    pub fn truncate_start_date(&mut self) {
        self.start_date = self.start_date.trunc_subsecs(6);
    }

    /// Момент, когда должно сработать напоминание.
    /// `None`, если смещение не помещается в диапазон дат.
    pub fn remind_time(&self) -> Option<DateTime<Utc>> {
        Duration::try_minutes(self.remind_at)
            .and_then(|offset| self.start_date.checked_sub_signed(offset))
    }

    /// Напоминание ещё не отправлено и его время наступило.
    pub fn is_reminder_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_send && self.remind_time().is_some_and(|at| at <= now)
    }
}

pub fn zero_date() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_DATE_TIMESTAMP, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn is_zero_date(date: &DateTime<Utc>) -> bool {
    *date == zero_date()
}

fn validate_start_date(date: &DateTime<Utc>) -> Result<(), ValidationError> {
    if is_zero_date(date) {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn validate_duration(duration: &Duration) -> Result<(), ValidationError> {
    if duration.is_zero() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Длительность в JSON и в БД хранится целым числом наносекунд.
pub mod duration_nanos {
    use chrono::Duration;
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};

    pub fn to_nanos(duration: &Duration) -> Option<i64> {
        duration.num_nanoseconds()
    }

    pub fn from_nanos(nanos: i64) -> Duration {
        Duration::nanoseconds(nanos)
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = to_nanos(duration)
            .ok_or_else(|| S::Error::custom("duration does not fit into i64 nanoseconds"))?;
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = i64::deserialize(deserializer)
            .map_err(|e| D::Error::custom(format!("duration must be integer nanoseconds: {e}")))?;
        Ok(from_nanos(nanos))
    }
}
