use serde::Deserialize;
use std::path::Path;

// Главная структура конфигурации - контейнер для всех настроек.
// Порядок источников: значения по умолчанию -> TOML-файл -> переменные
// окружения вида CALENDAR__DATABASE__IN_MEMORY=true
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub logger: LoggerConfig,
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub kafka: KafkaConfig,
    pub schedule: ScheduleConfig,
}

// Настройки логирования
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Директива EnvFilter: "info", "calendar=debug,tower_http=info" и т.п.
    pub level: String,
    /// Файл для дублирования логов; пустая строка - только stdout.
    pub path: String,
}

// Настройки хранилища
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub in_memory: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
    pub pool_size: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.user, self.password, self.host, self.port, self.db
        )
    }
}

// Настройки HTTP-сервера
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Сколько ждать завершения активных запросов при остановке.
    pub shutdown_timeout_secs: u64,
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Настройки Kafka
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group: String,
    pub consume_topic: String,
    pub produce_topic: String,
    pub service_name: String,
}

// Расписание планировщика
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub cron: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("logger.level", "calendar=info,tower_http=info")?
            .set_default("logger.path", "")?
            .set_default("database.in_memory", true)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432_i64)?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "postgres")?
            .set_default("database.db", "calendar")?
            .set_default("database.pool_size", 10_i64)?
            .set_default("http.host", "0.0.0.0")?
            .set_default("http.port", 8080_i64)?
            .set_default("http.shutdown_timeout_secs", 3_i64)?
            .set_default("kafka.brokers", "localhost:9092")?
            .set_default("kafka.group", "calendar")?
            .set_default("kafka.consume_topic", "calendar.events")?
            .set_default("kafka.produce_topic", "calendar.reminders")?
            .set_default("kafka.service_name", "calendar")?
            .set_default("schedule.cron", "* * * * *")?
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("CALENDAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
