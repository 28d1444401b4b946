use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Event;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_event))
        .route("/update", put(update_event))
        .route("/delete", delete(delete_event))
        .route("/getDay", get(get_events_day))
        .route("/getWeek", get(get_events_week))
        .route("/getMonth", get(get_events_month))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

impl OwnerQuery {
    fn owner(&self) -> Result<&str, AppError> {
        match self.owner.as_deref() {
            Some(owner) if !owner.is_empty() => Ok(owner),
            _ => Err(AppError::validation("owner", "owner is required")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: String,
}

// Ошибка разбора JSON отдаётся как 400 с текстом ошибки
fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    if body.is_empty() {
        return Err(AppError::validation("body", "body is required"));
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation("body", e.to_string()))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Event>, AppError> {
    let event: Event = decode_body(&body)?;
    let created = state.calendar.create_event(event).await?;
    Ok(Json(created))
}

pub async fn update_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Event>, AppError> {
    let event: Event = decode_body(&body)?;
    let updated = state.calendar.update_event(event).await?;
    Ok(Json(updated))
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DeleteRequest>, AppError> {
    let request: DeleteRequest = decode_body(&body)?;
    if request.id.is_empty() {
        return Err(AppError::MissingId);
    }

    state.calendar.delete_event(&request.id).await?;
    Ok(Json(request))
}

pub async fn get_events_day(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.calendar.get_events_day(params.owner()?).await?;
    Ok(Json(events))
}

pub async fn get_events_week(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.calendar.get_events_week(params.owner()?).await?;
    Ok(Json(events))
}

pub async fn get_events_month(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.calendar.get_events_month(params.owner()?).await?;
    Ok(Json(events))
}
