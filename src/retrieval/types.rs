// src/retrieval/types.rs
//
// Normalized shapes for the upstream event API. The raw responses vary by
// account/plan (multilingual title objects vs plain strings, dateTime vs
// date, image vs thumbnail, nested source objects), so normalization is done
// over `serde_json::Value` rather than rigid structs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::text::normalize_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub pages: u32,
    pub total_results: u64,
    pub count: usize,
}

/// One upstream event (a cluster of articles covering the same story) plus
/// whatever coverage the fallback chain could attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCluster {
    pub id: String,
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub total_articles: u64,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// English text from a multilingual `{ "eng": ... }` object, the first
/// available language otherwise, or the plain string itself.
pub fn first_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("eng") {
                return s.clone();
            }
            map.values()
                .find_map(|x| x.as_str())
                .unwrap_or_default()
                .to_string()
        }
        _ => String::new(),
    }
}

fn str_field<'a>(v: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
}

/// Normalize one raw upstream article record.
pub fn normalize_article(a: &Value) -> Article {
    let source = a
        .get("source")
        .map(|s| match s {
            Value::String(plain) => plain.clone(),
            other => str_field(other, &["title", "uri"]).to_string(),
        })
        .unwrap_or_default();

    Article {
        title: normalize_text(&first_text(a.get("title").unwrap_or(&Value::Null))),
        url: str_field(a, &["url"]).to_string(),
        source,
        published_at: str_field(a, &["dateTime", "date"]).to_string(),
        image: str_field(a, &["image", "thumbnail"]).to_string(),
        description: normalize_text(&first_text(a.get("body").unwrap_or(&Value::Null))),
    }
}

/// Normalize a raw result list, dropping entries the upstream marks as
/// duplicates.
pub fn normalize_articles(items: &[Value]) -> Vec<Article> {
    items
        .iter()
        .filter(|a| a.get("isDuplicate").and_then(Value::as_bool) != Some(true))
        .map(normalize_article)
        .collect()
}

/// Normalize one raw upstream event record (without coverage).
pub fn normalize_event(e: &Value) -> EventCluster {
    let total_articles = e
        .get("articleCounts")
        .and_then(|c| c.get("eng"))
        .and_then(Value::as_u64)
        .or_else(|| e.get("totalArticleCount").and_then(Value::as_u64))
        .unwrap_or(0);

    let concepts = e
        .get("concepts")
        .and_then(Value::as_array)
        .map(|cs| {
            cs.iter()
                .map(|c| first_text(c.get("label").unwrap_or(&Value::Null)))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    EventCluster {
        id: str_field(e, &["uri"]).to_string(),
        headline: normalize_text(&first_text(e.get("title").unwrap_or(&Value::Null))),
        summary: normalize_text(&first_text(e.get("summary").unwrap_or(&Value::Null))),
        published_at: str_field(e, &["eventDate"]).to_string(),
        total_articles,
        concepts,
        articles: Vec::new(),
    }
}
