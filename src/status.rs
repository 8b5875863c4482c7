// src/status.rs
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Engine progress as seen by external observers. Serialized field names are
/// the contract the dashboard polls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub running: bool,
    #[serde(rename = "current_status")]
    pub phase: String,
    pub current_account: String,
    #[serde(rename = "last_update")]
    pub last_update_utc: Option<String>,
    pub processed_tweets: u64,
    #[serde(rename = "next_check_time")]
    pub next_check_utc: Option<String>,
    pub last_result: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            running: false,
            phase: "idle".to_string(),
            current_account: String::new(),
            last_update_utc: None,
            processed_tweets: 0,
            next_check_utc: None,
            last_result: "no results yet".to_string(),
        }
    }
}

/// Shared handle around the snapshot. The engine worker is the only writer;
/// every write replaces fields under one guard and every read clones the
/// whole value, so observers never see a half-updated snapshot.
#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<StatusSnapshot>>,
    interval_secs: Arc<AtomicU64>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().expect("status lock poisoned").clone()
    }

    /// Set phase + current account, stamp `last_update`, recompute the next
    /// check ETA from the configured interval. An empty `result` leaves
    /// `last_result` untouched.
    pub fn update(&self, phase: &str, account: &str, result: &str) {
        let now = Utc::now();
        let next = now + Duration::seconds(self.interval_secs.load(Ordering::Relaxed) as i64);
        let mut s = self.inner.write().expect("status lock poisoned");
        s.phase = phase.to_string();
        s.current_account = account.to_string();
        s.last_update_utc = Some(now.to_rfc3339());
        if !result.is_empty() {
            s.last_result = result.to_string();
        }
        s.next_check_utc = Some(next.to_rfc3339());
    }

    pub fn incr_processed(&self) {
        let mut s = self.inner.write().expect("status lock poisoned");
        s.processed_tweets += 1;
    }

    /// Fresh run: counters back to zero, marked running.
    pub fn reset_for_start(&self, interval_secs: u64) {
        self.interval_secs.store(interval_secs, Ordering::Relaxed);
        let mut s = self.inner.write().expect("status lock poisoned");
        s.running = true;
        s.phase = "starting".to_string();
        s.current_account = String::new();
        s.last_update_utc = Some(Utc::now().to_rfc3339());
        s.processed_tweets = 0;
        s.next_check_utc = None;
    }

    pub fn mark_stopped(&self, phase: &str) {
        let mut s = self.inner.write().expect("status lock poisoned");
        s.running = false;
        s.phase = phase.to_string();
        s.current_account = String::new();
        s.next_check_utc = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().expect("status lock poisoned").running
    }
}
