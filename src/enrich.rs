// src/enrich.rs
//! LLM enrichment: three independent chat completions per tweet (Chinese
//! translation, analysis, title). A failed call degrades its own field only.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::types::Enrichment;

/// Substituted for a field whose completion call failed.
pub const FAILURE_MARKER: &str = "AI处理失败";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Low-level seam: one chat completion.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// High-level seam the engine depends on.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, text: &str) -> Result<Enrichment>;
}

impl Enrichment {
    /// Uniform degraded record used when the whole enrichment batch fails;
    /// the tweet is still persisted.
    pub fn from_failure(original_text: &str, err: &anyhow::Error) -> Self {
        let msg = err.to_string();
        let short: String = msg.chars().take(50).collect();
        Self {
            title: format!("处理失败: {short}"),
            translation: original_text.to_string(),
            analysis: format!("{FAILURE_MARKER}: {msg}"),
        }
    }
}

fn translate_prompt(text: &str) -> String {
    format!(
        "请将以下英文推文翻译成中文，保持原意和语气：\n\n推文内容：{text}\n\n请只返回翻译结果，不要包含其他说明。"
    )
}

fn analysis_prompt(text: &str) -> String {
    format!(
        "请对以下推文进行深度解读分析，包括其含义、背景、可能的影响等,全文内容在160字左右：\n\n推文内容：{text}\n\n请从以下角度进行分析：\n1. 推文的主要信息和观点\n2. 可能的背景和原因\n3. 对相关领域的影响\n4. 其他值得关注的要点\n\n请用中文回答，内容要有深度和见解。"
    )
}

fn title_prompt(text: &str) -> String {
    format!(
        "请为以下推文生成一个简洁有力的中文标题，要求：\n1. 控制在15-25个字以内\n2. 能够准确概括推文的核心内容\n3. 具有吸引力和新闻性\n\n推文内容：{text}\n\n请只返回标题，不要包含其他内容。"
    )
}

/// Issues the three prompts against any [`ChatApi`]. The calls are
/// independent and idempotent; there is no shared state between them.
pub struct EnrichmentClient {
    api: Arc<dyn ChatApi>,
}

impl EnrichmentClient {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    async fn ask(&self, prompt: &str) -> String {
        match self.api.complete(SYSTEM_PROMPT, prompt).await {
            Ok(s) => s.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = ?e, "llm call failed");
                counter!("monitor_enrich_failures_total").increment(1);
                FAILURE_MARKER.to_string()
            }
        }
    }

    async fn enrich_impl(&self, text: &str) -> Enrichment {
        let translation = self.ask(&translate_prompt(text)).await;
        let analysis = self.ask(&analysis_prompt(text)).await;
        let title = self.ask(&title_prompt(text)).await;
        Enrichment {
            title,
            translation,
            analysis,
        }
    }
}

#[async_trait]
impl Enricher for EnrichmentClient {
    async fn enrich(&self, text: &str) -> Result<Enrichment> {
        Ok(self.enrich_impl(text).await)
    }
}

// ------------------------------------------------------------
// OpenAI-compatible chat completion provider
// ------------------------------------------------------------

pub struct OpenAiChatApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatApi {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("tweet-ai-monitor/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatApi for OpenAiChatApi {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion failed: {status} - {body}"));
        }

        let body: Resp = resp.json().await.context("decoding chat completion")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }
}
