// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod bias;
pub mod config;
pub mod metrics;
pub mod retrieval;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::bias::types::{Bias, BiasItem, BiasResult, Label, Via};
pub use crate::bias::{BiasService, Classifier};
pub use crate::config::AppConfig;
pub use crate::retrieval::NewsService;
