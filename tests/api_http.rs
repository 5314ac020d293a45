// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/bias (single + batch, precedence and error shapes)
// - GET /api/news (upstream failure surfaces as 502)
// - GET /api/event-articles (missing param, exhausted coverage)

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use newslens::api::{self, AppState};
use newslens::bias::source_map::SourceBiasTable;
use newslens::bias::types::{WorkerItem, WorkerResult};
use newslens::bias::{BiasService, Classifier};
use newslens::config::ErConfig;
use newslens::retrieval::er::ErClient;
use newslens::retrieval::NewsService;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Labels everything LEFT, so model-path responses are recognizable.
struct LeftClassifier;

#[async_trait]
impl Classifier for LeftClassifier {
    async fn classify(&self, items: &[WorkerItem]) -> Result<Vec<WorkerResult>> {
        Ok(items
            .iter()
            .map(|it| WorkerResult {
                id: it.id.clone(),
                label: Some("LEFT".to_string()),
            })
            .collect())
    }
    fn name(&self) -> &'static str {
        "left"
    }
}

struct BrokenClassifier;

#[async_trait]
impl Classifier for BrokenClassifier {
    async fn classify(&self, _items: &[WorkerItem]) -> Result<Vec<WorkerResult>> {
        Err(anyhow!("bias worker exited"))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

/// Build the Router the way the binary wires it, but with an in-process
/// classifier and an unreachable upstream.
fn test_router_with(classifier: Arc<dyn Classifier>) -> Router {
    let bias = Arc::new(BiasService::new(
        SourceBiasTable::load_default(),
        64,
        classifier,
    ));
    let er = ErClient::new(&ErConfig {
        base_url: "http://127.0.0.1:9/api/v1".to_string(),
        api_key: "test-key".to_string(),
    })
    .expect("er client");
    let news = Arc::new(NewsService::new(Arc::new(er), 2));
    api::router(AppState { bias, news })
}

fn test_router() -> Router {
    test_router_with(Arc::new(LeftClassifier))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn bias_single_resolves_mapped_source() {
    let app = test_router();
    let resp = app
        .oneshot(post_json("/api/bias", json!({ "source": "Fox News" })))
        .await
        .expect("oneshot /api/bias");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["label"], "RIGHT");
    assert_eq!(v["via"], "map");
}

#[tokio::test]
async fn bias_single_without_text_or_source_is_400() {
    let app = test_router();
    let resp = app
        .oneshot(post_json("/api/bias", json!({})))
        .await
        .expect("oneshot /api/bias");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = read_json(resp).await;
    assert!(v.get("error").is_some());
}

#[tokio::test]
async fn bias_batch_applies_precedence_per_item() {
    let app = test_router();
    let payload = json!({
        "items": [
            { "id": "mapped", "source": "Reuters", "text": "ignored by the map" },
            { "id": "model", "text": "some unmapped headline" },
            { "id": "failsafe" }
        ]
    });
    let resp = app
        .oneshot(post_json("/api/bias", payload))
        .await
        .expect("oneshot /api/bias");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    let results = v["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["id"], "mapped");
    assert_eq!(results[0]["label"], "CENTER");
    assert_eq!(results[0]["via"], "map");

    assert_eq!(results[1]["id"], "model");
    assert_eq!(results[1]["label"], "LEFT");
    assert_eq!(results[1]["via"], "model");

    assert_eq!(results[2]["id"], "failsafe");
    assert_eq!(results[2]["label"], "CENTER");
    assert_eq!(results[2]["via"], "model");
}

#[tokio::test]
async fn bias_batch_surfaces_worker_failure_as_502() {
    let app = test_router_with(Arc::new(BrokenClassifier));
    let payload = json!({ "items": [{ "id": "x", "text": "needs the model" }] });
    let resp = app
        .oneshot(post_json("/api/bias", payload))
        .await
        .expect("oneshot /api/bias");
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let v = read_json(resp).await;
    assert!(v.get("error").is_some());
}

#[tokio::test]
async fn bias_batch_of_mapped_items_survives_broken_worker() {
    // Nothing needs the model, so the broken classifier is never consulted.
    let app = test_router_with(Arc::new(BrokenClassifier));
    let payload = json!({ "items": [{ "id": "a", "source": "Fox News" }] });
    let resp = app
        .oneshot(post_json("/api/bias", payload))
        .await
        .expect("oneshot /api/bias");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["results"][0]["label"], "RIGHT");
}

#[tokio::test]
async fn news_maps_upstream_failure_to_502() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/api/news?limit=3")
        .body(Body::empty())
        .expect("build GET /api/news");

    let resp = app.oneshot(req).await.expect("oneshot /api/news");
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let v = read_json(resp).await;
    assert!(v.get("error").is_some());
}

#[tokio::test]
async fn event_articles_requires_event_uri() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/api/event-articles")
        .body(Body::empty())
        .expect("build GET /api/event-articles");

    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_articles_with_unreachable_upstream_is_empty_not_error() {
    let app = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/api/event-articles?eventUri=ev-1&count=5")
        .body(Body::empty())
        .expect("build GET /api/event-articles");

    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["eventUri"], "ev-1");
    assert_eq!(v["results"].as_array().map(Vec::len), Some(0));
    assert_eq!(v["pageInfo"]["count"], 0);
}
