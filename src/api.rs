use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::bias::types::{BiasItem, Label, Via};
use crate::bias::BiasService;
use crate::retrieval::er::EventsQuery;
use crate::retrieval::NewsService;

#[derive(Clone)]
pub struct AppState {
    pub bias: Arc<BiasService>,
    pub news: Arc<NewsService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/bias", post(bias))
        .route("/api/news", get(news))
        .route("/api/events", get(events))
        .route("/api/event-articles", get(event_articles))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Batch mode carries `items`; anything else is treated as the legacy
/// single-item shape.
#[derive(Deserialize)]
#[serde(untagged)]
enum BiasRequest {
    Batch {
        items: Vec<BiasItem>,
    },
    Single {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        source: Option<String>,
    },
}

async fn bias(State(state): State<AppState>, Json(req): Json<BiasRequest>) -> Response {
    match req {
        BiasRequest::Batch { items } => match state.bias.classify_batch(&items).await {
            Ok(results) => (StatusCode::OK, Json(json!({ "results": results }))).into_response(),
            Err(e) => {
                error!(error = ?e, "batch classification failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        },
        BiasRequest::Single { text, source } => {
            if text.as_deref().unwrap_or("").is_empty()
                && source.as_deref().unwrap_or("").is_empty()
            {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Missing text or source" })),
                )
                    .into_response();
            }
            match state
                .bias
                .classify_single(text.as_deref(), source.as_deref())
                .await
            {
                Ok((label, via)) => {
                    (StatusCode::OK, Json(json!({ "label": label, "via": via }))).into_response()
                }
                Err(e) => {
                    // Legacy path fails safe so the UI stays usable.
                    error!(error = ?e, "single classification failed");
                    (
                        StatusCode::OK,
                        Json(json!({
                            "label": Label::Center,
                            "via": Via::Model,
                            "error": e.to_string(),
                        })),
                    )
                        .into_response()
                }
            }
        }
    }
}

#[derive(Deserialize)]
struct NewsParams {
    q: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

async fn news(State(state): State<AppState>, Query(params): Query<NewsParams>) -> Response {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    match state.news.clusters(params.q, params.category, limit).await {
        Ok(clusters) => (StatusCode::OK, Json(json!({ "clusters": clusters }))).into_response(),
        Err(e) => {
            error!(error = ?e, "news feed assembly failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Event Registry fetch failed", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct EventsParams {
    page: Option<u32>,
    count: Option<usize>,
    category: Option<String>,
}

async fn events(State(state): State<AppState>, Query(params): Query<EventsParams>) -> Response {
    let query = EventsQuery {
        page: params.page.unwrap_or(1),
        count: params.count.unwrap_or(20).clamp(1, 50),
        category: params.category,
        keyword: None,
    };
    match state.news.events(&query).await {
        Ok(page) => (
            StatusCode::OK,
            Json(json!({ "results": page.results, "pageInfo": page.page_info })),
        )
            .into_response(),
        Err(e) => {
            error!(error = ?e, "event search failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Event Registry fetch failed", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct EventArticlesParams {
    #[serde(rename = "eventUri")]
    event_uri: Option<String>,
    count: Option<usize>,
}

async fn event_articles(
    State(state): State<AppState>,
    Query(params): Query<EventArticlesParams>,
) -> Response {
    let Some(event_uri) = params.event_uri.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing eventUri" })),
        )
            .into_response();
    };
    // Exhausted coverage is an empty list, never an error.
    let (results, page_info) = state
        .news
        .event_articles(&event_uri, params.count.unwrap_or(10))
        .await;
    (
        StatusCode::OK,
        Json(json!({
            "eventUri": event_uri,
            "results": results,
            "pageInfo": page_info,
        })),
    )
        .into_response()
}
