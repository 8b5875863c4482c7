// src/engine.rs
//! Polling engine. One background worker runs the fetch → enrich → persist
//! cycle over the configured account list, owns the incremental watermark,
//! and publishes progress through the shared status handle.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::enrich::{EnrichmentClient, Enricher, OpenAiChatApi};
use crate::source::{HttpSearchApi, SearchClient, TweetSource};
use crate::status::StatusHandle;
use crate::store::RecordStore;
use crate::types::{EnrichedRecord, Enrichment};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Completed poll cycles.");
        describe_counter!(
            "monitor_tweets_fetched_total",
            "Tweets returned by the search API."
        );
        describe_counter!(
            "monitor_tweets_processed_total",
            "Tweets enriched and handed to the store."
        );
        describe_counter!(
            "monitor_tweets_dedup_total",
            "Tweets skipped as already stored."
        );
        describe_counter!("monitor_fetch_errors_total", "Failed search requests.");
        describe_counter!(
            "monitor_enrich_failures_total",
            "LLM calls that fell back to the failure marker."
        );
        describe_gauge!(
            "monitor_last_cycle_ts",
            "Unix ts when the last poll cycle finished."
        );
    });
}

struct EngineWorker {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Explicit engine handle owned by the hosting process. At most one worker
/// runs at a time, which also makes it the store's only writer.
pub struct MonitorEngine {
    status: StatusHandle,
    store: Arc<RecordStore>,
    worker: tokio::sync::Mutex<Option<EngineWorker>>,
    countdown_tick: Duration,
}

impl MonitorEngine {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            status: StatusHandle::new(),
            store,
            worker: tokio::sync::Mutex::new(None),
            countdown_tick: Duration::from_secs(10),
        }
    }

    /// Shorter ticks give tests a tighter stop-latency bound.
    pub fn with_countdown_tick(mut self, tick: Duration) -> Self {
        self.countdown_tick = tick;
        self
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Build the production clients from the config and start the worker.
    pub async fn start(&self, config: MonitorConfig) -> Result<String> {
        if !config.has_required_keys() {
            bail!("API keys are not configured");
        }
        let source = Arc::new(SearchClient::new(HttpSearchApi::new(
            config.twitter_api_key.clone(),
        )));
        let enricher = Arc::new(EnrichmentClient::new(Arc::new(OpenAiChatApi::new(
            config.llm_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
        ))));
        self.start_with(config, source, enricher).await
    }

    /// Start with explicit source/enricher implementations (also the seam
    /// integration tests drive with mocks).
    pub async fn start_with(
        &self,
        config: MonitorConfig,
        source: Arc<dyn TweetSource>,
        enricher: Arc<dyn Enricher>,
    ) -> Result<String> {
        ensure_metrics_described();
        let mut slot = self.worker.lock().await;
        if slot.is_some() {
            bail!("monitor is already running");
        }

        self.status.reset_for_start(config.check_interval_secs);
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_worker(
            config,
            source,
            enricher,
            self.store.clone(),
            self.status.clone(),
            stop.clone(),
            self.countdown_tick,
        ));
        *slot = Some(EngineWorker { stop, task });
        Ok("monitor started".to_string())
    }

    /// Request stop and join the worker (bounded wait). In-flight network
    /// calls run to completion; the flag is observed at cycle boundaries and
    /// between countdown ticks.
    pub async fn stop(&self) -> Result<String> {
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            self.status.mark_stopped("stopped");
            return Ok("monitor was not running".to_string());
        };

        worker.stop.store(true, Ordering::Relaxed);
        match tokio::time::timeout(Duration::from_secs(3), worker.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = ?e, "monitor worker ended abnormally"),
            Err(_) => tracing::warn!("monitor worker did not stop within 3s; detaching"),
        }
        self.status.mark_stopped("stopped");
        Ok("monitor stopped".to_string())
    }
}

async fn run_worker(
    config: MonitorConfig,
    source: Arc<dyn TweetSource>,
    enricher: Arc<dyn Enricher>,
    store: Arc<RecordStore>,
    status: StatusHandle,
    stop: Arc<AtomicBool>,
    tick: Duration,
) {
    // Watermark: exclusive lower bound of the next query window. Advances to
    // the end of each completed cycle, never rewinds.
    let mut watermark = Utc::now() - ChronoDuration::hours(config.initial_hours);
    tracing::info!(
        accounts = ?config.target_accounts,
        interval_secs = config.check_interval_secs,
        initial_hours = config.initial_hours,
        "monitor started"
    );
    status.update(
        "started",
        &format!("monitoring {} accounts", config.target_accounts.len()),
        "",
    );

    let mut final_phase = "stopped";
    'run: while !stop.load(Ordering::Relaxed) {
        let until = Utc::now();
        match run_cycle(
            source.as_ref(),
            enricher.as_ref(),
            &store,
            &status,
            &config,
            watermark,
            until,
        )
        .await
        {
            Ok(processed) => {
                watermark = until;
                counter!("monitor_cycles_total").increment(1);
                gauge!("monitor_last_cycle_ts").set(Utc::now().timestamp() as f64);
                tracing::debug!(processed, "cycle finished");
            }
            Err(e) => {
                tracing::error!(error = ?e, "monitor cycle failed; stopping");
                status.update("stopped on error", "", &format!("error: {e:#}"));
                final_phase = "stopped on error";
                break 'run;
            }
        }

        // Inter-cycle countdown; the stop flag is checked once per tick so a
        // stop request takes effect with bounded latency.
        let mut remaining = config.check_interval_secs;
        while remaining > 0 {
            if stop.load(Ordering::Relaxed) {
                break 'run;
            }
            status.update(&format!("next scan in {remaining}s"), "", "");
            let step = tick.min(Duration::from_secs(remaining));
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step.as_secs().max(1));
        }
    }

    status.mark_stopped(final_phase);
    tracing::info!("monitor stopped");
}

/// One full pass: fetch every account's window, enrich and persist each
/// discovered tweet. A failed account is reported and skipped; a store write
/// failure aborts the cycle (and with it the engine).
pub async fn run_cycle(
    source: &dyn TweetSource,
    enricher: &dyn Enricher,
    store: &RecordStore,
    status: &StatusHandle,
    config: &MonitorConfig,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<usize> {
    let accounts = &config.target_accounts;
    status.update("scanning", &accounts.join(", "), "");

    let mut items = Vec::new();
    for (idx, account) in accounts.iter().enumerate() {
        status.update(&format!("fetching @{account}"), account, "");
        match source
            .fetch_window(account, since, until, config.exclude_replies)
            .await
        {
            Ok(batch) => {
                tracing::info!(account, count = batch.len(), "fetched window");
                items.extend(batch);
            }
            Err(e) => {
                tracing::warn!(error = ?e, account, "fetch failed; continuing with remaining accounts");
                counter!("monitor_fetch_errors_total").increment(1);
                status.update(
                    &format!("fetch failed for @{account}"),
                    account,
                    &format!("error: {e:#}"),
                );
            }
        }
        if idx + 1 < accounts.len() {
            tokio::time::sleep(Duration::from_secs(config.account_delay_secs)).await;
        }
    }

    if items.is_empty() {
        status.update("idle, no new tweets", "", "no new tweets found");
        return Ok(0);
    }

    let total = items.len();
    status.update(
        &format!("found {total} new tweets, enriching"),
        "",
        &format!("found {total} new tweets"),
    );

    let mut processed = 0usize;
    for (idx, item) in items.iter().enumerate() {
        status.update(&format!("enriching {}/{total}", idx + 1), &item.author, "");

        let enrichment = match enricher.enrich(&item.text).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = ?e, id = %item.id, "enrichment failed; saving degraded record");
                Enrichment::from_failure(&item.text, &e)
            }
        };

        let record = EnrichedRecord {
            id: item.id.clone(),
            author: item.author.clone(),
            created_at: item.created_at.clone(),
            original_text: item.text.clone(),
            tweet_url: EnrichedRecord::permalink(&item.author, &item.id),
            ai_title: enrichment.title,
            ai_translation: enrichment.translation,
            ai_analysis: enrichment.analysis,
            timestamp: Utc::now().to_rfc3339(),
            processed_date: Local::now().format("%Y-%m-%d").to_string(),
        };
        store.append(&record).context("persisting enriched tweet")?;
        counter!("monitor_tweets_processed_total").increment(1);
        status.incr_processed();
        processed += 1;

        tokio::time::sleep(Duration::from_secs(config.item_delay_secs)).await;
    }

    status.update("cycle complete", "", &format!("processed {processed} tweets"));
    Ok(processed)
}
