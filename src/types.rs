// src/types.rs
use serde::{Deserialize, Serialize};

/// One tweet as returned by the search API, tagged with the queried account.
/// Lives only for the duration of a single poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub id: String,
    pub author: String,
    pub text: String,
    /// Source-reported timestamp, passed through verbatim.
    pub created_at: Option<String>,
}

/// The three LLM-derived fields attached to a tweet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Enrichment {
    pub title: String,
    pub translation: String,
    pub analysis: String,
}

/// Persisted unit, one per tweet. Field names match the on-disk JSON the
/// dashboard reads; `id` is the dedup key, `processed_date` the partition key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub original_text: String,
    pub tweet_url: String,
    pub ai_title: String,
    pub ai_translation: String,
    pub ai_analysis: String,
    /// Processing instant, UTC RFC3339.
    pub timestamp: String,
    /// Local calendar day at processing time, `YYYY-MM-DD`.
    pub processed_date: String,
}

impl EnrichedRecord {
    pub fn permalink(author: &str, id: &str) -> String {
        format!("https://twitter.com/{author}/status/{id}")
    }
}
