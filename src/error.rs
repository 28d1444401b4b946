//! Ошибки календаря: хранилище, сервис, публикация и приём сообщений.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Ошибки хранилища событий.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("event with id {0} already exists")]
    AlreadyExists(String),

    #[error("event with id {0} does not exist")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Ошибки сервисного слоя. Текст ошибки уходит клиенту как есть.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{reason}")]
    Validation { field: &'static str, reason: String },

    #[error("id is required")]
    MissingId,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::MissingId => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            AppError::Storage(StorageError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Ошибка отправки напоминания в брокер.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to publish event {id} to {topic}: {reason}")]
    Kafka {
        id: String,
        topic: String,
        reason: String,
    },
}

/// Ошибки обработки входящего сообщения.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("message has no payload")]
    EmptyPayload,

    #[error("failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

impl From<StorageError> for ConsumeError {
    fn from(err: StorageError) -> Self {
        ConsumeError::App(AppError::Storage(err))
    }
}
