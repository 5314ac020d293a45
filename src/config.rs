// src/config.rs
//
// Process configuration from environment variables (a local `.env` is loaded
// by the binary before this runs). Every knob has a default so the service
// boots with nothing but an upstream API key.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::bias::cache::DEFAULT_CAPACITY;
use crate::bias::worker::{WorkerConfig, DEFAULT_TIMEOUT};

#[derive(Debug, Clone)]
pub struct ErConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cache_capacity: usize,
    pub coverage_fan_out: usize,
    pub event_registry: ErConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("EVENT_REGISTRY_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            warn!("EVENT_REGISTRY_API_KEY is not set, upstream calls will fail");
        }

        let mut worker = WorkerConfig::default();
        if let Ok(cmd) = std::env::var("NEWSLENS_WORKER_CMD") {
            let mut parts = cmd.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                worker.command = program;
                worker.args = parts.collect();
            }
        }
        worker.timeout = Duration::from_millis(env_parse(
            "NEWSLENS_WORKER_TIMEOUT_MS",
            DEFAULT_TIMEOUT.as_millis() as u64,
        ));

        Self {
            port: env_parse("NEWSLENS_PORT", 8080),
            cache_capacity: env_parse("NEWSLENS_CACHE_CAPACITY", DEFAULT_CAPACITY),
            coverage_fan_out: env_parse("NEWSLENS_COVERAGE_FANOUT", 4),
            event_registry: ErConfig {
                base_url: std::env::var("EVENT_REGISTRY_BASE")
                    .unwrap_or_else(|_| "https://eventregistry.org/api/v1".to_string()),
                api_key,
            },
            worker,
        }
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "unparseable env value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
