// src/bias/mod.rs
//
// Bias-labeling pipeline: a short-circuit decision chain per item
// (deterministic source map -> content-digest cache -> one batched call to
// the external classifier), with a failsafe CENTER for items carrying
// neither source nor text.

pub mod cache;
pub mod source_map;
pub mod types;
pub mod worker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use crate::bias::cache::{text_digest, BiasCache};
use crate::bias::source_map::SourceBiasTable;
use crate::bias::types::{BiasItem, BiasResult, Label, Via, WorkerItem, WorkerResult};

/// Seam to the model backend. Production uses [`worker::WorkerClassifier`];
/// tests substitute their own implementation.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, items: &[WorkerItem]) -> Result<Vec<WorkerResult>>;
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;

pub struct BiasService {
    table: SourceBiasTable,
    cache: Mutex<BiasCache>,
    classifier: DynClassifier,
}

impl BiasService {
    pub fn new(table: SourceBiasTable, cache_capacity: usize, classifier: DynClassifier) -> Self {
        Self {
            table,
            cache: Mutex::new(BiasCache::new(cache_capacity)),
            classifier,
        }
    }

    /// Label a batch, one result per input item, in input order.
    ///
    /// Per-item precedence: source map, then digest cache, then the model
    /// (queued items go out as a single batched request), then the CENTER
    /// failsafe for items with neither source nor text. A worker transport
    /// failure fails the whole batch; the next batch recovers transparently.
    pub async fn classify_batch(&self, items: &[BiasItem]) -> Result<Vec<BiasResult>> {
        let mut by_id: HashMap<String, (Label, Via)> = HashMap::with_capacity(items.len());
        let mut queued: Vec<WorkerItem> = Vec::new();
        let mut queued_digests: HashMap<String, String> = HashMap::new();

        for (idx, it) in items.iter().enumerate() {
            let id = item_id(idx, it);

            if let Some(source) = it.source.as_deref() {
                if let Some(bias) = self.table.bias_for(source) {
                    counter!("bias_labels_total", "via" => "map").increment(1);
                    by_id.insert(id, (bias.into(), Via::Map));
                    continue;
                }
            }

            let text = it.text.as_deref().unwrap_or("").trim();
            if text.is_empty() {
                // Failsafe default; availability over strict correctness.
                counter!("bias_labels_total", "via" => "model").increment(1);
                by_id.insert(id, (Label::Center, Via::Model));
                continue;
            }

            let key = text_digest(text);
            let cached = {
                let cache = self.cache.lock().expect("bias cache poisoned");
                cache.get(&key)
            };
            if let Some(bias) = cached {
                counter!("bias_labels_total", "via" => "cache").increment(1);
                by_id.insert(id, (bias.into(), Via::Cache));
                continue;
            }

            queued_digests.insert(id.clone(), key);
            queued.push(WorkerItem {
                id,
                text: text.to_string(),
            });
        }

        if !queued.is_empty() {
            debug!(n = queued.len(), classifier = self.classifier.name(), "batched model request");
            let results = self.classifier.classify(&queued).await?;
            let mut cache = self.cache.lock().expect("bias cache poisoned");
            for r in &results {
                let label = r.validated();
                counter!("bias_labels_total", "via" => "model").increment(1);
                if let (Some(bias), Some(key)) = (label.bias(), queued_digests.get(&r.id)) {
                    cache.insert(key.clone(), bias);
                }
                // Last write wins on duplicate ids.
                by_id.insert(r.id.clone(), (label, Via::Model));
            }
        }

        Ok(items
            .iter()
            .enumerate()
            .map(|(idx, it)| {
                let id = item_id(idx, it);
                // Items the model response omitted default to Unknown.
                let (label, via) = by_id
                    .get(&id)
                    .copied()
                    .unwrap_or((Label::Unknown, Via::Model));
                BiasResult { id, label, via }
            })
            .collect())
    }

    /// Legacy single-item path. Callers must supply text or source.
    pub async fn classify_single(
        &self,
        text: Option<&str>,
        source: Option<&str>,
    ) -> Result<(Label, Via)> {
        if let Some(source) = source {
            if let Some(bias) = self.table.bias_for(source) {
                counter!("bias_labels_total", "via" => "map").increment(1);
                return Ok((bias.into(), Via::Map));
            }
        }

        let text = text.unwrap_or("").trim();
        if text.is_empty() {
            counter!("bias_labels_total", "via" => "model").increment(1);
            return Ok((Label::Center, Via::Model));
        }

        let key = text_digest(text);
        let cached = {
            let cache = self.cache.lock().expect("bias cache poisoned");
            cache.get(&key)
        };
        if let Some(bias) = cached {
            counter!("bias_labels_total", "via" => "cache").increment(1);
            return Ok((bias.into(), Via::Cache));
        }

        let results = self
            .classifier
            .classify(&[WorkerItem {
                id: "single".to_string(),
                text: text.to_string(),
            }])
            .await?;
        let label = results
            .first()
            .map(|r| r.validated())
            .unwrap_or(Label::Unknown);
        counter!("bias_labels_total", "via" => "model").increment(1);
        if let Some(bias) = label.bias() {
            let mut cache = self.cache.lock().expect("bias cache poisoned");
            cache.insert(key, bias);
        }
        Ok((label, Via::Model))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("bias cache poisoned").len()
    }
}

/// Batch item id: explicit id, else the source name, else a synthetic
/// per-position id. Deterministic so the merge pass rederives it.
fn item_id(idx: usize, it: &BiasItem) -> String {
    it.id
        .clone()
        .or_else(|| it.source.clone())
        .unwrap_or_else(|| format!("item-{idx}"))
}
