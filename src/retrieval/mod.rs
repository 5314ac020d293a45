// src/retrieval/mod.rs
//
// "Best effort" article retrieval: an ordered fallback chain of upstream
// query shapes, short-circuiting on the first strategy that returns a
// non-empty normalized list. Exhaustion yields an empty list, never an
// error, so the UI always renders (possibly with zero coverage).

pub mod er;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::retrieval::er::{
    ArticleSearchStrategy, EmbeddedEventStrategy, ErClient, EventArticlesStrategy, EventPage,
    EventsQuery,
};
use crate::retrieval::types::{Article, EventCluster, PageInfo};

/// Per-cluster coverage cap when assembling the news feed.
const CLUSTER_ARTICLE_CAP: u64 = 12;

/// One upstream query shape with the uniform `(event, count) -> articles`
/// contract the chain requires.
#[async_trait]
pub trait CoverageStrategy: Send + Sync {
    async fn fetch(&self, event_uri: &str, count: usize) -> Result<Vec<Article>>;
    fn name(&self) -> &'static str;
}

/// Try each strategy in order; first non-empty result wins. Failures are
/// logged and the next strategy is attempted.
pub async fn fetch_coverage(
    strategies: &[Box<dyn CoverageStrategy>],
    event_uri: &str,
    count: usize,
) -> Vec<Article> {
    for strategy in strategies {
        match strategy.fetch(event_uri, count).await {
            Ok(articles) if !articles.is_empty() => {
                counter!("coverage_strategy_hits_total", "strategy" => strategy.name())
                    .increment(1);
                debug!(event_uri, strategy = strategy.name(), n = articles.len(), "coverage found");
                return articles;
            }
            Ok(_) => {
                debug!(event_uri, strategy = strategy.name(), "strategy returned no items");
            }
            Err(e) => {
                warn!(event_uri, strategy = strategy.name(), error = ?e, "strategy failed");
            }
        }
    }
    counter!("coverage_exhausted_total").increment(1);
    warn!(event_uri, "no coverage from any strategy");
    Vec::new()
}

/// Apply `f` to every item with at most `limit` calls in flight. Output order
/// matches input order regardless of completion order; a panicked task leaves
/// the default value at its slot.
pub async fn map_with_limit<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Default + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(tokio::sync::Semaphore::new(limit.max(1)));
    let f = Arc::new(f);
    let n = items.len();

    let mut set = tokio::task::JoinSet::new();
    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (idx, f(item).await)
        });
    }

    let mut out: Vec<R> = (0..n).map(|_| R::default()).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, value)) => out[idx] = value,
            Err(e) => warn!(error = ?e, "coverage task failed"),
        }
    }
    out
}

/// Event search plus per-event coverage assembly.
pub struct NewsService {
    er: Arc<ErClient>,
    strategies: Arc<Vec<Box<dyn CoverageStrategy>>>,
    fan_out: usize,
}

impl NewsService {
    pub fn new(er: Arc<ErClient>, fan_out: usize) -> Self {
        let strategies: Vec<Box<dyn CoverageStrategy>> = vec![
            Box::new(ArticleSearchStrategy {
                client: Arc::clone(&er),
            }),
            Box::new(EventArticlesStrategy {
                client: Arc::clone(&er),
            }),
            Box::new(EmbeddedEventStrategy {
                client: Arc::clone(&er),
            }),
        ];
        Self {
            er,
            strategies: Arc::new(strategies),
            fan_out: fan_out.max(1),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let er = Arc::new(ErClient::new(&cfg.event_registry)?);
        Ok(Self::new(er, cfg.coverage_fan_out))
    }

    /// The news feed: newest events with coverage attached, fetched with
    /// bounded fan-out against the upstream.
    pub async fn clusters(
        &self,
        keyword: Option<String>,
        category: Option<String>,
        limit: usize,
    ) -> Result<Vec<EventCluster>> {
        let page = self
            .er
            .events(&EventsQuery {
                page: 1,
                count: limit,
                category,
                keyword,
            })
            .await?;
        let mut clusters = page.results;

        let requests: Vec<(String, usize)> = clusters
            .iter()
            .map(|c| {
                let want = c.total_articles.clamp(1, CLUSTER_ARTICLE_CAP) as usize;
                (c.id.clone(), want)
            })
            .collect();

        let strategies = Arc::clone(&self.strategies);
        let coverage = map_with_limit(requests, self.fan_out, move |(uri, count)| {
            let strategies = Arc::clone(&strategies);
            async move { fetch_coverage(&strategies, &uri, count).await }
        })
        .await;

        for (cluster, articles) in clusters.iter_mut().zip(coverage) {
            cluster.articles = articles;
        }
        Ok(clusters)
    }

    /// Raw event search (no coverage attachment).
    pub async fn events(&self, query: &EventsQuery) -> Result<EventPage> {
        self.er.events(query).await
    }

    /// Coverage for a single event through the fallback chain.
    pub async fn event_articles(&self, event_uri: &str, count: usize) -> (Vec<Article>, PageInfo) {
        let count = count.clamp(1, 50);
        let articles = fetch_coverage(&self.strategies, event_uri, count).await;
        let info = PageInfo {
            page: 1,
            pages: 1,
            total_results: articles.len() as u64,
            count: articles.len(),
        };
        (articles, info)
    }
}
