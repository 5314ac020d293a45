//! # Source-bias table
//!
//! Deterministic mapping from outlet display names to bias labels. The table
//! is authoritative: when it has an entry, that entry is final and is never
//! overridden by a cached or model-derived label.
//!
//! - Loads from TOML or JSON config (`config/source_bias.toml` / `.json`).
//! - Case-insensitive lookup; strips protocol noise, a leading `www.`, and
//!   collapses whitespace.
//! - A loosened second pass strips a leading "The" and a trailing
//!   `| Section` / `- Subtitle` suffix.
//! - Includes a built-in `default_seed()` with common outlets.
//!
//! A missed lookup returns `None` ("no mapping"), which is distinct from a
//! classification failure.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::bias::types::Bias;

const ENV_PATH: &str = "NEWSLENS_SOURCE_BIAS_PATH";

#[derive(Debug, Clone)]
pub struct SourceBiasTable {
    map: HashMap<String, Bias>,
}

impl SourceBiasTable {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Bias)>,
        S: AsRef<str>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (normalize(k.as_ref()), v))
            .collect();
        Self { map }
    }

    /// Load the table from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading source bias table from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_table(&content, ext.as_str())
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWSLENS_SOURCE_BIAS_PATH
    /// 2) config/source_bias.toml
    /// 3) config/source_bias.json
    /// 4) built-in seed
    pub fn load_default() -> Self {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            match Self::load_from(&pb) {
                Ok(t) => return t,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %pb.display(), "source bias table load failed, using seed");
                    return Self::default_seed();
                }
            }
        }
        for candidate in ["config/source_bias.toml", "config/source_bias.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                match Self::load_from(&pb) {
                    Ok(t) => return t,
                    Err(e) => {
                        tracing::warn!(error = ?e, path = candidate, "source bias table parse failed");
                    }
                }
            }
        }
        Self::default_seed()
    }

    /// Resolve an outlet name to a bias label, or `None` for "no mapping".
    ///
    /// Matching order:
    /// 1. Exact match on the normalized name.
    /// 2. Loosened variants: trailing `| …` / `- …` suffix cut, leading
    ///    "The" stripped, and both combined.
    pub fn bias_for(&self, source: &str) -> Option<Bias> {
        let n = normalize(source);
        if n.is_empty() {
            return None;
        }
        if let Some(&b) = self.map.get(&n) {
            return Some(b);
        }
        for cand in loosened_variants(&n) {
            if let Some(&b) = self.map.get(&cand) {
                return Some(b);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Built-in seed carrying the canonical outlet table. Used as fallback
    /// when no config file is found.
    pub(crate) fn default_seed() -> Self {
        use Bias::*;
        Self::from_entries([
            // LEFT
            ("the guardian", Left),
            ("guardian.com", Left),
            ("the guardian us", Left),
            ("cbs news", Left),
            ("cbsnews.com", Left),
            ("yahoo! news", Left),
            ("news.yahoo.com", Left),
            ("the washington post", Left),
            ("washingtonpost.com", Left),
            ("msnbc", Left),
            ("huffpost", Left),
            // RIGHT
            ("the post millennial", Right),
            ("thepostmillennial.com", Right),
            ("fox news", Right),
            ("foxnews.com", Right),
            ("breitbart", Right),
            ("the daily wire", Right),
            ("newsmax", Right),
            // CENTER
            ("associated press", Center),
            ("apnews.com", Center),
            ("reuters", Center),
            ("reuters.com", Center),
            ("npr", Center),
            ("bbc news", Center),
            ("usa today", Center),
        ])
    }
}

/// Normalize an outlet name: lowercase, strip scheme and leading `www.`,
/// collapse whitespace.
fn normalize(s: &str) -> String {
    let mut t = s.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = t.strip_prefix(scheme) {
            t = rest.to_string();
        }
    }
    if let Some(rest) = t.strip_prefix("www.") {
        t = rest.to_string();
    }
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Loosened lookup candidates for a normalized name, most specific first.
fn loosened_variants(n: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(3);
    let cut = cut_suffix(n);
    if cut != n {
        out.push(cut.to_string());
    }
    for base in [n, cut] {
        if let Some(rest) = base.strip_prefix("the ") {
            let rest = rest.trim();
            if !rest.is_empty() {
                out.push(rest.to_string());
            }
        }
    }
    out.dedup();
    out
}

/// Cut a trailing `| Section` or `- Subtitle` suffix.
fn cut_suffix(n: &str) -> &str {
    for sep in [" | ", " - ", " – "] {
        if let Some(idx) = n.find(sep) {
            return n[..idx].trim_end();
        }
    }
    n
}

fn parse_table(s: &str, hint_ext: &str) -> Result<SourceBiasTable> {
    let try_toml = hint_ext == "toml" || s.contains("[sources]");
    if try_toml {
        if let Ok(t) = parse_toml(s) {
            return Ok(t);
        }
    }
    if let Ok(t) = parse_json(s) {
        return Ok(t);
    }
    if !try_toml {
        if let Ok(t) = parse_toml(s) {
            return Ok(t);
        }
    }
    Err(anyhow!("unsupported source bias table format"))
}

fn parse_toml(s: &str) -> Result<SourceBiasTable> {
    #[derive(Deserialize)]
    struct TomlTable {
        sources: HashMap<String, Bias>,
    }
    let v: TomlTable = toml::from_str(s)?;
    Ok(SourceBiasTable::from_entries(v.sources))
}

fn parse_json(s: &str) -> Result<SourceBiasTable> {
    let v: HashMap<String, Bias> = serde_json::from_str(s)?;
    Ok(SourceBiasTable::from_entries(v))
}
