// tests/enrich_degradation.rs
//
// A single failed completion degrades only its own field; the other two
// survive. The engine-level fallback produces a uniform degraded record.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use tweet_ai_monitor::enrich::{ChatApi, EnrichmentClient, Enricher, FAILURE_MARKER};
use tweet_ai_monitor::types::Enrichment;

/// Answers each of the three prompts by keyword, failing only where told.
struct SelectiveChatApi {
    fail_analysis: bool,
}

#[async_trait]
impl ChatApi for SelectiveChatApi {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        if user.contains("翻译") {
            Ok("译文".to_string())
        } else if user.contains("标题") {
            Ok("标题".to_string())
        } else if self.fail_analysis {
            Err(anyhow!("upstream 500"))
        } else {
            Ok("解读".to_string())
        }
    }
}

#[tokio::test]
async fn failed_analysis_call_degrades_only_the_analysis_field() {
    let client = EnrichmentClient::new(Arc::new(SelectiveChatApi {
        fail_analysis: true,
    }));
    let out = client.enrich("Some tweet text").await.unwrap();
    assert_eq!(out.translation, "译文");
    assert_eq!(out.title, "标题");
    assert_eq!(out.analysis, FAILURE_MARKER);
}

#[tokio::test]
async fn all_calls_succeeding_yields_all_three_fields() {
    let client = EnrichmentClient::new(Arc::new(SelectiveChatApi {
        fail_analysis: false,
    }));
    let out = client.enrich("Some tweet text").await.unwrap();
    assert_eq!(
        out,
        Enrichment {
            title: "标题".to_string(),
            translation: "译文".to_string(),
            analysis: "解读".to_string(),
        }
    );
}

#[test]
fn uniform_failure_keeps_the_original_text_as_translation() {
    let err = anyhow!("connection reset");
    let out = Enrichment::from_failure("original tweet", &err);
    assert!(out.title.starts_with("处理失败:"));
    assert_eq!(out.translation, "original tweet");
    assert!(out.analysis.starts_with(FAILURE_MARKER));
    assert!(out.analysis.contains("connection reset"));
}
