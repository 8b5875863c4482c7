// src/source.rs
//! Wrapper around the twitterapi.io advanced search endpoint: query building
//! and cursor pagination for one account/time-window query.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use crate::types::RawItem;

/// One page of search results as the upstream reports them.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<RawItem>,
    pub has_next_page: bool,
    pub next_cursor: String,
}

/// Low-level seam: fetch a single page. Separated from the window logic so
/// pagination can be exercised against a mock.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &str, cursor: Option<&str>) -> Result<SearchPage>;
}

/// High-level seam the engine depends on.
#[async_trait]
pub trait TweetSource: Send + Sync {
    async fn fetch_window(
        &self,
        account: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_replies: bool,
    ) -> Result<Vec<RawItem>>;
}

const TIME_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Builds the advanced-search query string the upstream expects.
pub fn build_query(
    account: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    exclude_replies: bool,
) -> String {
    let since = since.format(TIME_FMT);
    let until = until.format(TIME_FMT);
    if exclude_replies {
        format!("from:{account} -is:reply since:{since} until:{until} include:nativeretweets")
    } else {
        format!("from:{account} since:{since} until:{until} include:nativeretweets")
    }
}

/// Paginates one account's window over any [`SearchApi`], tagging every item
/// with the queried account (the upstream does not reliably echo it).
pub struct SearchClient<A: SearchApi> {
    api: A,
}

impl<A: SearchApi> SearchClient<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: SearchApi> TweetSource for SearchClient<A> {
    async fn fetch_window(
        &self,
        account: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_replies: bool,
    ) -> Result<Vec<RawItem>> {
        let query = build_query(account, since, until, exclude_replies);
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.api.search(&query, cursor.as_deref()).await?;
            counter!("monitor_tweets_fetched_total").increment(page.items.len() as u64);
            all.extend(page.items.into_iter().map(|mut t| {
                t.author = account.to_string();
                t
            }));
            if page.has_next_page && !page.next_cursor.is_empty() {
                cursor = Some(page.next_cursor);
            } else {
                break;
            }
        }

        tracing::debug!(account, count = all.len(), "window fetched");
        Ok(all)
    }
}

// ------------------------------------------------------------
// Production HTTP implementation
// ------------------------------------------------------------

pub const DEFAULT_SEARCH_URL: &str = "https://api.twitterapi.io/twitter/tweet/advanced_search";

pub struct HttpSearchApi {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    tweets: Vec<ApiTweet>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    id_str: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(rename = "createdAt", default)]
    created_at: Option<String>,
}

impl HttpSearchApi {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, DEFAULT_SEARCH_URL.to_string())
    }

    pub fn with_url(api_key: String, url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("tweet-ai-monitor/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self { http, api_key, url }
    }
}

#[async_trait]
impl SearchApi for HttpSearchApi {
    async fn search(&self, query: &str, cursor: Option<&str>) -> Result<SearchPage> {
        let mut params = vec![("query", query), ("queryType", "Latest")];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }

        let resp = self
            .http
            .get(&self.url)
            .header("X-API-Key", &self.api_key)
            .query(&params)
            .send()
            .await
            .context("tweet search request")?;

        // A non-success status ends pagination for this account; whatever the
        // window already collected is kept.
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "tweet search returned an error status");
            counter!("monitor_fetch_errors_total").increment(1);
            return Ok(SearchPage::default());
        }

        let body: ApiResponse = resp.json().await.context("decoding search response")?;
        let mut items = Vec::with_capacity(body.tweets.len());
        for t in body.tweets {
            let Some(id) = t.id.or(t.id_str) else {
                tracing::warn!("dropping tweet without id");
                continue;
            };
            items.push(RawItem {
                id,
                author: String::new(), // tagged by the caller
                text: t.text,
                created_at: t.created_at,
            });
        }

        Ok(SearchPage {
            items,
            has_next_page: body.has_next_page,
            next_cursor: body.next_cursor,
        })
    }
}
