// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use tweet_ai_monitor::api::{create_router, AppState};
use tweet_ai_monitor::engine::MonitorEngine;
use tweet_ai_monitor::store::RecordStore;
use tweet_ai_monitor::types::EnrichedRecord;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn test_router(tmp: &tempfile::TempDir) -> (Router, Arc<RecordStore>, PathBuf) {
    let store = Arc::new(RecordStore::new(tmp.path().join("data")));
    let engine = Arc::new(MonitorEngine::new(store.clone()));
    let config_path = tmp.path().join("config.json");
    let state = AppState {
        engine,
        store: store.clone(),
        config_path: config_path.clone(),
    };
    (create_router(state), store, config_path)
}

fn record(id: &str, author: &str, date: &str) -> EnrichedRecord {
    EnrichedRecord {
        id: id.to_string(),
        author: author.to_string(),
        created_at: None,
        original_text: "text".to_string(),
        tweet_url: EnrichedRecord::permalink(author, id),
        ai_title: "标题".to_string(),
        ai_translation: "译文".to_string(),
        ai_analysis: "解读".to_string(),
        timestamp: format!("{date}T12:00:00+00:00"),
        processed_date: date.to_string(),
    }
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_returns_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _, _) = test_router(&tmp);

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_reports_not_running_by_default() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _, _) = test_router(&tmp);

    let resp = app
        .oneshot(
            Request::get("/api/monitoring_status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v.get("running"), Some(&Json::Bool(false)));
    assert!(v.get("current_status").is_some());
    assert!(v.get("processed_tweets").is_some());
    assert!(v.get("last_result").is_some());
}

#[tokio::test]
async fn tweets_endpoint_filters_by_author_and_date() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, store, _) = test_router(&tmp);
    store.append(&record("1", "OpenAI", "2025-07-01")).unwrap();
    store
        .append(&record("2", "AnthropicAI", "2025-07-01"))
        .unwrap();
    store.append(&record("3", "OpenAI", "2025-07-02")).unwrap();

    let resp = app
        .clone()
        .oneshot(Request::get("/api/tweets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let all = json_body(resp).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let resp = app
        .clone()
        .oneshot(
            Request::get("/api/tweets?author=openai")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let by_author = json_body(resp).await;
    assert_eq!(by_author.as_array().unwrap().len(), 2);

    let resp = app
        .oneshot(
            Request::get("/api/tweets?date=2025-07-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let by_date = json_body(resp).await;
    assert_eq!(by_date.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn tweet_detail_finds_by_id_or_404s() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, store, _) = test_router(&tmp);
    store.append(&record("42", "OpenAI", "2025-07-01")).unwrap();

    let resp = app
        .clone()
        .oneshot(Request::get("/api/tweets/42").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v.get("id"), Some(&Json::String("42".to_string())));

    let resp = app
        .oneshot(Request::get("/api/tweets/99").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_without_configured_keys_reports_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _, _) = test_router(&tmp);

    let resp = app
        .oneshot(
            Request::post("/api/start_monitoring")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let v = json_body(resp).await;
    assert_eq!(v.get("success"), Some(&Json::Bool(false)));
}

#[tokio::test]
async fn save_config_validates_and_normalizes_accounts() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _, config_path) = test_router(&tmp);

    // missing LLM key is rejected
    let bad = json!({"TWITTER_API_KEY": "t", "LLM_URL": "https://llm.example"});
    let resp = app
        .clone()
        .oneshot(
            Request::post("/api/save_config")
                .header("content-type", "application/json")
                .body(Body::from(bad.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let v = json_body(resp).await;
    assert_eq!(v.get("success"), Some(&Json::Bool(false)));

    // comma-separated accounts are normalized into a list
    let good = json!({
        "TWITTER_API_KEY": "t",
        "LLM_URL": "https://llm.example",
        "LLM_API_KEY": "l",
        "TARGET_ACCOUNTS": "OpenAI, AnthropicAI ,",
        "CHECK_INTERVAL": "120"
    });
    let resp = app
        .oneshot(
            Request::post("/api/save_config")
                .header("content-type", "application/json")
                .body(Body::from(good.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let v = json_body(resp).await;
    assert_eq!(v.get("success"), Some(&Json::Bool(true)));

    let saved = tweet_ai_monitor::config::MonitorConfig::load_from(&config_path).unwrap();
    assert_eq!(
        saved.target_accounts,
        vec!["OpenAI".to_string(), "AnthropicAI".to_string()]
    );
    assert_eq!(saved.check_interval_secs, 120);
}
