// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Persisted monitor configuration. Keys mirror the dashboard's settings
/// form; unknown keys round-trip through `extra` so a save never drops them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(rename = "TWITTER_API_KEY", default)]
    pub twitter_api_key: String,
    #[serde(rename = "LLM_URL", default = "default_llm_url")]
    pub llm_url: String,
    #[serde(rename = "LLM_API_KEY", default)]
    pub llm_api_key: String,
    #[serde(rename = "LLM_MODEL", default = "default_llm_model")]
    pub llm_model: String,
    #[serde(rename = "TARGET_ACCOUNTS", default = "default_accounts")]
    pub target_accounts: Vec<String>,
    #[serde(rename = "CHECK_INTERVAL", default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(rename = "INITIAL_HOURS", default = "default_initial_hours")]
    pub initial_hours: i64,
    #[serde(rename = "EXCLUDE_REPLIES", default)]
    pub exclude_replies: bool,
    // Upstream rate limits are real; keep the pacing knobs configurable.
    #[serde(rename = "ACCOUNT_DELAY_SECONDS", default = "default_account_delay")]
    pub account_delay_secs: u64,
    #[serde(rename = "ITEM_DELAY_SECONDS", default = "default_item_delay")]
    pub item_delay_secs: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_llm_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}
fn default_llm_model() -> String {
    "qwen-plus".to_string()
}
fn default_accounts() -> Vec<String> {
    vec!["OpenAI".to_string()]
}
fn default_check_interval() -> u64 {
    300
}
fn default_initial_hours() -> i64 {
    2
}
fn default_account_delay() -> u64 {
    5
}
fn default_item_delay() -> u64 {
    2
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            twitter_api_key: String::new(),
            llm_url: default_llm_url(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            target_accounts: default_accounts(),
            check_interval_secs: default_check_interval(),
            initial_hours: default_initial_hours(),
            exclude_replies: false,
            account_delay_secs: default_account_delay(),
            item_delay_secs: default_item_delay(),
            extra: serde_json::Map::new(),
        }
    }
}

impl MonitorConfig {
    /// Load from an explicit path. Missing file yields defaults; a malformed
    /// file is an error (a broken settings document should be visible, not
    /// silently replaced).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using $MONITOR_CONFIG_PATH, falling back to `config.json`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Path::new(&path))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing config")?;
        fs::write(path, json).with_context(|| format!("writing config to {}", path.display()))
    }

    /// Both upstream credentials are required before the engine may start.
    pub fn has_required_keys(&self) -> bool {
        !self.twitter_api_key.is_empty() && !self.llm_api_key.is_empty()
    }
}
