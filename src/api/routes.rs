//! API route handlers.

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::detect::Event;
use crate::storage;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(submit_event))
        .route("/analyze", post(analyze_event))
        .route("/status", get(status))
        .route("/logs/training", get(training_logs))
        .route("/logs/detections", get(detection_logs))
}

/// Raw caller payload; every field optional so validation can name what
/// is missing instead of letting deserialization reject the request.
#[derive(Debug, Deserialize)]
pub struct EventPayload {
    ip_address: Option<String>,
    username: Option<String>,
    event_type: Option<String>,
    event_value: Option<f64>,
    timestamp: Option<String>,
}

/// Accept RFC 3339 first, then a naive ISO 8601 timestamp read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

impl EventPayload {
    /// Validate required fields and produce an immutable event. A missing
    /// or unparseable timestamp defaults to the submission time.
    fn into_event(self) -> Result<Event, ApiError> {
        let mut missing = Vec::new();
        if self.ip_address.is_none() {
            missing.push("ip_address");
        }
        if self.username.is_none() {
            missing.push("username");
        }
        if self.event_type.is_none() {
            missing.push("event_type");
        }
        if self.event_value.is_none() {
            missing.push("event_value");
        }
        if !missing.is_empty() {
            return Err(ApiError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let event_value = self.event_value.unwrap_or_default();
        if !event_value.is_finite() {
            return Err(ApiError::Validation(
                "event_value must be a finite number".to_string(),
            ));
        }

        Ok(Event {
            ip_address: self.ip_address.unwrap_or_default(),
            username: self.username.unwrap_or_default(),
            event_type: self.event_type.unwrap_or_default(),
            event_value,
            timestamp: self
                .timestamp
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        })
    }
}

async fn submit_event(
    State(state): State<AppState>,
    Json(payload): Json<EventPayload>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event = payload.into_event()?;
    let pool = state.pool.clone();
    let id = tokio::task::spawn_blocking(move || storage::insert_event(&pool, &event))
        .await
        .map_err(anyhow::Error::from)??;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "id": id })),
    ))
}

async fn analyze_event(
    State(state): State<AppState>,
    Json(payload): Json<EventPayload>,
) -> Result<Json<Value>, ApiError> {
    let event = payload.into_event()?;
    let analysis = state.scoring.analyze(&event).await?;
    Ok(Json(json!({
        "anomaly_score": analysis.score,
        "prediction": analysis.prediction,
        "model_last_trained": analysis.model_trained_at.map(|t| t.to_rfc3339()),
    })))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": format!("threatsentry v{}", env!("CARGO_PKG_VERSION")),
        "model_trained": state.holder.is_trained(),
        "last_training_time": state.holder.last_trained_at().map(|t| t.to_rfc3339()),
        "training_interval_sec": state.config.training_interval_secs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

const DEFAULT_LOG_LIMIT: usize = 20;

async fn training_logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = tokio::task::spawn_blocking(move || storage::list_training_logs(&pool, limit))
        .await
        .map_err(anyhow::Error::from)??;
    let total = logs.len();
    Ok(Json(json!({ "data": logs, "meta": { "total": total } })))
}

async fn detection_logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = tokio::task::spawn_blocking(move || storage::list_detection_logs(&pool, limit))
        .await
        .map_err(anyhow::Error::from)??;
    let total = logs.len();
    Ok(Json(json!({ "data": logs, "meta": { "total": total } })))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}
