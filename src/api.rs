// src/api.rs
//! JSON control surface for the dashboard frontend: engine start/stop,
//! status, stored tweets, and the settings document.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::config::MonitorConfig;
use crate::engine::MonitorEngine;
use crate::status::StatusSnapshot;
use crate::store::RecordStore;
use crate::types::EnrichedRecord;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub store: Arc<RecordStore>,
    pub config_path: PathBuf,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/start_monitoring", post(start_monitoring))
        .route("/api/stop_monitoring", post(stop_monitoring))
        .route("/api/monitoring_status", get(monitoring_status))
        .route("/api/tweets", get(list_tweets))
        .route("/api/tweets/{id}", get(tweet_detail))
        .route("/api/config", get(get_config))
        .route("/api/save_config", post(save_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ApiResult {
    success: bool,
    message: String,
}

impl ApiResult {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
    fn err(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            message: message.into(),
        })
    }
}

async fn start_monitoring(State(state): State<AppState>) -> Json<ApiResult> {
    let config = match MonitorConfig::load_from(&state.config_path) {
        Ok(c) => c,
        Err(e) => return ApiResult::err(format!("config error: {e:#}")),
    };
    match state.engine.start(config).await {
        Ok(msg) => ApiResult::ok(msg),
        Err(e) => ApiResult::err(e.to_string()),
    }
}

async fn stop_monitoring(State(state): State<AppState>) -> Json<ApiResult> {
    match state.engine.stop().await {
        Ok(msg) => ApiResult::ok(msg),
        Err(e) => ApiResult::err(e.to_string()),
    }
}

async fn monitoring_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.engine.status().snapshot())
}

#[derive(Deserialize)]
struct TweetFilter {
    #[serde(default)]
    author: String,
    #[serde(default)]
    date: String,
}

async fn list_tweets(
    State(state): State<AppState>,
    Query(filter): Query<TweetFilter>,
) -> Json<Vec<EnrichedRecord>> {
    let mut tweets = state.store.load_all();
    if !filter.author.is_empty() {
        tweets.retain(|t| t.author.eq_ignore_ascii_case(&filter.author));
    }
    if !filter.date.is_empty() {
        tweets.retain(|t| t.processed_date.starts_with(&filter.date));
    }
    Json(tweets)
}

async fn tweet_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EnrichedRecord>, (StatusCode, &'static str)> {
    state
        .store
        .load_all()
        .into_iter()
        .find(|t| t.id == id)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "tweet not found"))
}

async fn get_config(State(state): State<AppState>) -> Result<Json<MonitorConfig>, Json<ApiResult>> {
    MonitorConfig::load_from(&state.config_path)
        .map(Json)
        .map_err(|e| ApiResult::err(format!("config error: {e:#}")))
}

/// Accepts the settings document as posted by the dashboard form: accounts
/// may arrive as an array or a comma-separated string, numbers as strings.
async fn save_config(
    State(state): State<AppState>,
    Json(mut body): Json<Value>,
) -> Json<ApiResult> {
    let Some(obj) = body.as_object_mut() else {
        return ApiResult::err("config must be a JSON object");
    };

    for field in ["TWITTER_API_KEY", "LLM_URL", "LLM_API_KEY"] {
        let present = obj
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !present {
            return ApiResult::err(format!("{field} must not be empty"));
        }
    }

    if let Some(s) = obj.get("TARGET_ACCOUNTS").and_then(Value::as_str) {
        let accounts: Vec<Value> = s
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| Value::String(a.to_string()))
            .collect();
        obj.insert("TARGET_ACCOUNTS".to_string(), Value::Array(accounts));
    }
    for key in [
        "CHECK_INTERVAL",
        "INITIAL_HOURS",
        "ACCOUNT_DELAY_SECONDS",
        "ITEM_DELAY_SECONDS",
    ] {
        if let Some(n) = obj
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<i64>().ok())
        {
            obj.insert(key.to_string(), Value::from(n));
        }
    }

    let config: MonitorConfig = match serde_json::from_value(body) {
        Ok(c) => c,
        Err(e) => return ApiResult::err(format!("invalid config: {e}")),
    };
    match config.save_to(&state.config_path) {
        Ok(()) => ApiResult::ok("configuration saved"),
        Err(e) => ApiResult::err(format!("saving config failed: {e:#}")),
    }
}
