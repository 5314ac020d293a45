// src/retrieval/er.rs
//
// Event Registry client: the upstream event-search API. The accepted
// parameter shape and the response nesting vary unpredictably by
// account/plan, which is why coverage fetching goes through the ordered
// strategy chain in `retrieval::fetch_coverage` instead of a single call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ErConfig;
use crate::retrieval::types::{normalize_articles, normalize_event, Article, EventCluster, PageInfo};
use crate::retrieval::CoverageStrategy;

const US_LOCATION: &str = "http://en.wikipedia.org/wiki/United_States";

/// Category -> concept-URI filters for event search. "latest" is unfiltered.
fn topic_concepts(category: &str) -> &'static [&'static str] {
    match category {
        "politics" => &["http://en.wikipedia.org/wiki/Politics"],
        "economy" => &["http://en.wikipedia.org/wiki/Economy"],
        "finance" => &["http://en.wikipedia.org/wiki/Finance"],
        "business" => &["http://en.wikipedia.org/wiki/Business"],
        "technology" => &["http://en.wikipedia.org/wiki/Technology"],
        "immigration" => &["http://en.wikipedia.org/wiki/Immigration"],
        _ => &[],
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventsQuery {
    pub page: u32,
    pub count: usize,
    pub category: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub results: Vec<EventCluster>,
    pub page_info: PageInfo,
}

pub struct ErClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
}

impl ErClient {
    pub fn new(cfg: &ErConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("newslens/0.1 (+github.com/newslens/newslens)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .context("building upstream http client")?;
        Ok(Self {
            http,
            base: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base, path);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        let text = resp.text().await.with_context(|| format!("reading {url}"))?;
        if !status.is_success() {
            let head: String = text.chars().take(800).collect();
            warn!(%url, %status, body = %head, "upstream request failed");
            return Err(anyhow!("upstream {url} failed with {status}"));
        }
        serde_json::from_str(&text).with_context(|| format!("parsing {url} response"))
    }

    /// Event search with category/keyword filters, newest first.
    pub async fn events(&self, q: &EventsQuery) -> Result<EventPage> {
        let mut and_filters = vec![json!({ "locationUri": US_LOCATION }), json!({ "lang": "eng" })];
        let category = q.category.as_deref().unwrap_or("latest").to_ascii_lowercase();
        for concept in topic_concepts(&category) {
            and_filters.push(json!({ "conceptUri": concept }));
        }
        if let Some(kw) = q.keyword.as_deref().filter(|s| !s.trim().is_empty()) {
            and_filters.push(json!({ "keyword": kw }));
        }

        let body = json!({
            "query": {
                "$query": { "$and": and_filters },
                "$filter": { "forceMaxDataTimeWindow": "31" }
            },
            "resultType": "events",
            "eventsSortBy": "date",
            "includeEventSummary": true,
            "includeEventLocation": false,
            "includeEventConcepts": true,
            "includeEventCategories": false,
            "eventImageCount": 1,
            "eventsPage": q.page.max(1),
            "eventsCount": q.count,
            "apiKey": self.api_key,
        });

        let json = self.post_json("event/getEvents", body).await?;
        let node = json.get("events").cloned().unwrap_or(Value::Null);
        let raw = node
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let results: Vec<EventCluster> = raw.iter().map(normalize_event).collect();
        let page_info = PageInfo {
            page: node.get("page").and_then(Value::as_u64).unwrap_or(1) as u32,
            pages: node.get("pages").and_then(Value::as_u64).unwrap_or(1) as u32,
            total_results: node
                .get("totalResults")
                .and_then(Value::as_u64)
                .unwrap_or(results.len() as u64),
            count: results.len(),
        };
        Ok(EventPage { results, page_info })
    }
}

/// Strategy A: article search filtered by event uri. Works across most plans.
pub struct ArticleSearchStrategy {
    pub client: Arc<ErClient>,
}

#[async_trait]
impl CoverageStrategy for ArticleSearchStrategy {
    async fn fetch(&self, event_uri: &str, count: usize) -> Result<Vec<Article>> {
        let body = json!({
            "apiKey": self.client.api_key,
            "query": { "eventUri": event_uri },
            "resultType": "articles",
            "articlesPage": 1,
            "articlesCount": count,
            "articlesSortBy": "date",
            "articleBodyLen": -1,
            "includeArticleImage": true,
            "includeArticleBasicInfo": true,
            "includeSourceInfo": true,
            "lang": "eng",
        });
        let json = self.client.post_json("article/getArticles", body).await?;
        Ok(extract_articles(&json, &["articles.results", "results"]))
    }

    fn name(&self) -> &'static str {
        "article-search"
    }
}

/// Strategy B: the dedicated articles-for-event endpoint (some plans only).
pub struct EventArticlesStrategy {
    pub client: Arc<ErClient>,
}

#[async_trait]
impl CoverageStrategy for EventArticlesStrategy {
    async fn fetch(&self, event_uri: &str, count: usize) -> Result<Vec<Article>> {
        let body = json!({
            "apiKey": self.client.api_key,
            "eventUri": event_uri,
            "articlesPage": 1,
            "articlesCount": count,
            "articlesSortBy": "date",
            "articlesArticleBodyLen": -1,
            "articlesIncludeArticleImage": true,
            "articlesIncludeArticleBasicInfo": true,
            "articlesIncludeSourceInfo": true,
            "articlesLang": "eng",
        });
        let json = self
            .client
            .post_json("event/getArticlesForEvent", body)
            .await?;
        Ok(extract_articles(&json, &["articles.results", "results"]))
    }

    fn name(&self) -> &'static str {
        "event-articles"
    }
}

/// Strategy C: fetch the event itself with embedded articles, trying the
/// `articles*` flag convention first and the older `include*` convention if
/// that yields nothing.
pub struct EmbeddedEventStrategy {
    pub client: Arc<ErClient>,
}

impl EmbeddedEventStrategy {
    fn body(&self, event_uri: &str, count: usize, older_flags: bool) -> Value {
        let mut body = json!({
            "apiKey": self.client.api_key,
            "eventUri": event_uri,
            "resultType": "event",
            "articlesPage": 1,
            "articlesCount": count,
            "articlesSortBy": "date",
        });
        let flags = if older_flags {
            json!({
                "articleBodyLen": -1,
                "includeArticleImage": true,
                "includeArticleBasicInfo": true,
                "includeSourceInfo": true,
                "lang": "eng",
            })
        } else {
            json!({
                "articlesArticleBodyLen": -1,
                "articlesIncludeArticleImage": true,
                "articlesIncludeArticleBasicInfo": true,
                "articlesIncludeSourceInfo": true,
                "articlesLang": "eng",
            })
        };
        if let (Some(b), Some(f)) = (body.as_object_mut(), flags.as_object()) {
            for (k, v) in f {
                b.insert(k.clone(), v.clone());
            }
        }
        body
    }

    fn extract(&self, json: &Value, event_uri: &str) -> Vec<Article> {
        let paths = [
            "event.articles.results".to_string(),
            "articles.results".to_string(),
            "event.info.articles.results".to_string(),
            // Some plans key the payload by the event uri itself.
            format!("{event_uri}.articles.results"),
        ];
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        extract_articles(json, &refs)
    }
}

#[async_trait]
impl CoverageStrategy for EmbeddedEventStrategy {
    async fn fetch(&self, event_uri: &str, count: usize) -> Result<Vec<Article>> {
        let json = self
            .client
            .post_json("event/getEvent", self.body(event_uri, count, false))
            .await?;
        let items = self.extract(&json, event_uri);
        if !items.is_empty() {
            return Ok(items);
        }

        debug!(event_uri, "embedded-event articles* flags yielded nothing, retrying include* flags");
        let json = self
            .client
            .post_json("event/getEvent", self.body(event_uri, count, true))
            .await?;
        Ok(self.extract(&json, event_uri))
    }

    fn name(&self) -> &'static str {
        "embedded-event"
    }
}

/// Pull a raw article list out of the first dotted path that holds an array,
/// normalized. Paths cover the response nestings seen across plans.
fn extract_articles(json: &Value, paths: &[&str]) -> Vec<Article> {
    for path in paths {
        let mut node = json;
        let mut ok = true;
        for seg in path.split('.') {
            match node.get(seg) {
                Some(next) => node = next,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        if let Some(items) = node.as_array() {
            if !items.is_empty() {
                return normalize_articles(items);
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_walks_paths_in_order() {
        let payload = json!({
            "results": [{"title": "flat", "url": "f"}],
            "articles": { "results": [{"title": "nested", "url": "n"}] }
        });
        let out = extract_articles(&payload, &["articles.results", "results"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "nested");
    }

    #[test]
    fn extract_skips_missing_and_empty_nodes() {
        let payload = json!({
            "articles": { "results": [] },
            "results": [{"title": "fallback", "url": "x"}]
        });
        let out = extract_articles(&payload, &["articles.results", "results"]);
        assert_eq!(out[0].title, "fallback");

        let none = extract_articles(&json!({}), &["articles.results", "results"]);
        assert!(none.is_empty());
    }

    #[test]
    fn topic_map_covers_known_categories() {
        assert_eq!(topic_concepts("politics").len(), 1);
        assert!(topic_concepts("latest").is_empty());
        assert!(topic_concepts("sports").is_empty());
    }
}
