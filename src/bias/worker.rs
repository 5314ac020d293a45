//! External classifier process manager.
//!
//! Maintains at most one live worker child reachable over a line-delimited
//! JSON protocol on its standard streams. Requests and responses are matched
//! by correlation id (monotonic counter + millisecond timestamp), so any
//! number of batches may be in flight against the single worker.
//!
//! Lifecycle: `ABSENT -> STARTING -> READY -> (EXITED -> ABSENT)`. Starting
//! and ready are not distinguished externally; the first write after spawn is
//! attempted immediately and pipe buffering absorbs the race. On exit every
//! pending request is failed at once and the next call respawns transparently.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::bias::types::{WorkerItem, WorkerResult};
use crate::bias::Classifier;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment for the child (thread caps for the ML runtime).
    pub env: Vec<(String, String)>,
    /// Per-request deadline. Expiry soft-fails to `Unknown`, it does not
    /// cancel the child's work.
    pub timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["model/bias_worker.py".to_string()],
            env: vec![
                ("OMP_NUM_THREADS".to_string(), "1".to_string()),
                ("MKL_NUM_THREADS".to_string(), "1".to_string()),
                ("TOKENIZERS_PARALLELISM".to_string(), "false".to_string()),
            ],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    id: &'a str,
    items: &'a [WorkerItem],
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    id: String,
    #[serde(default)]
    results: Vec<WorkerResult>,
}

/// Pending-request ledger: correlation id -> resolver. An entry is removed by
/// the matching response line, by its deadline, or by worker exit, whichever
/// fires first. A late response to an evicted id is discarded.
type Pending = Arc<StdMutex<HashMap<String, oneshot::Sender<WorkerResponse>>>>;

struct Session {
    epoch: u64,
    stdin: ChildStdin,
}

pub struct WorkerClassifier {
    cfg: WorkerConfig,
    session: Arc<AsyncMutex<Option<Session>>>,
    pending: Pending,
    seq: AtomicU64,
    epochs: AtomicU64,
}

impl WorkerClassifier {
    pub fn new(cfg: WorkerConfig) -> Self {
        Self {
            cfg,
            session: Arc::new(AsyncMutex::new(None)),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            seq: AtomicU64::new(0),
            epochs: AtomicU64::new(0),
        }
    }

    fn next_correlation_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", n, Utc::now().timestamp_millis())
    }

    fn spawn_session(&self) -> Result<Session> {
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed) + 1;

        let mut cmd = Command::new(&self.cfg.command);
        cmd.args(&self.cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.cfg.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning bias worker `{}`", self.cfg.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("bias worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("bias worker stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("bias worker stderr unavailable"))?;

        info!(epoch, pid = ?child.id(), command = %self.cfg.command, "bias worker started");
        counter!("bias_worker_spawns_total").increment(1);

        tokio::spawn(pump_stderr(stderr));
        tokio::spawn(pump_stdout(
            child,
            stdout,
            epoch,
            Arc::clone(&self.pending),
            Arc::clone(&self.session),
        ));

        Ok(Session { epoch, stdin })
    }

    async fn classify_impl(&self, items: &[WorkerItem]) -> Result<Vec<WorkerResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let corr = self.next_correlation_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending ledger poisoned");
            pending.insert(corr.clone(), tx);
        }

        let mut line = serde_json::to_string(&WorkerRequest {
            id: &corr,
            items,
        })
        .context("encoding bias worker request")?;
        line.push('\n');

        // Hold the session lock only for the write so concurrent batches can
        // multiplex over the same child.
        {
            let mut guard = self.session.lock().await;
            if guard.is_none() {
                match self.spawn_session() {
                    Ok(s) => *guard = Some(s),
                    Err(e) => {
                        self.forget(&corr);
                        return Err(e);
                    }
                }
            }
            let session = guard
                .as_mut()
                .ok_or_else(|| anyhow!("bias worker unavailable"))?;
            let wrote = async {
                session.stdin.write_all(line.as_bytes()).await?;
                session.stdin.flush().await
            }
            .await;
            if let Err(e) = wrote {
                // The child likely died between spawn and write; clear the
                // handle so the next call respawns.
                *guard = None;
                self.forget(&corr);
                return Err(e).context("writing to bias worker");
            }
        }

        match tokio::time::timeout(self.cfg.timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp.results),
            Ok(Err(_)) => Err(anyhow!("bias worker exited")),
            Err(_) => {
                // Fail open: degrade to Unknown instead of blocking callers.
                self.forget(&corr);
                counter!("bias_worker_timeouts_total").increment(1);
                warn!(corr_id = %corr, n = items.len(), "bias worker timed out, resolving Unknown");
                Ok(items
                    .iter()
                    .map(|it| WorkerResult {
                        id: it.id.clone(),
                        label: None,
                    })
                    .collect())
            }
        }
    }

    fn forget(&self, corr: &str) {
        let mut pending = self.pending.lock().expect("pending ledger poisoned");
        pending.remove(corr);
    }
}

#[async_trait]
impl Classifier for WorkerClassifier {
    async fn classify(&self, items: &[WorkerItem]) -> Result<Vec<WorkerResult>> {
        self.classify_impl(items).await
    }

    fn name(&self) -> &'static str {
        "worker"
    }
}

async fn pump_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(line = %line, "bias worker stderr");
    }
}

/// Reads response lines until the child closes stdout, then clears the live
/// handle and fails every pending request.
async fn pump_stdout(
    mut child: Child,
    stdout: ChildStdout,
    epoch: u64,
    pending: Pending,
    session: Arc<AsyncMutex<Option<Session>>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<WorkerResponse>(&line) {
            Ok(resp) => {
                let waiter = {
                    let mut pending = pending.lock().expect("pending ledger poisoned");
                    pending.remove(&resp.id)
                };
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(resp);
                    }
                    None => {
                        debug!(corr_id = %resp.id, "discarding late or unmatched worker response");
                    }
                }
            }
            Err(e) => {
                warn!(error = ?e, "malformed bias worker line, dropping");
            }
        }
    }

    match child.wait().await {
        Ok(status) => warn!(epoch, %status, "bias worker exited"),
        Err(e) => warn!(epoch, error = ?e, "bias worker exited, wait failed"),
    }
    counter!("bias_worker_exits_total").increment(1);

    // Only the epoch that observed the exit may clear the handle and reject
    // the ledger; a respawned session's requests must survive.
    let mut guard = session.lock().await;
    let ours = guard.as_ref().map(|s| s.epoch) == Some(epoch);
    if ours {
        *guard = None;
        drop(guard);
        let drained: Vec<_> = {
            let mut pending = pending.lock().expect("pending ledger poisoned");
            pending.drain().collect()
        };
        if !drained.is_empty() {
            warn!(n = drained.len(), "rejecting in-flight bias requests");
        }
        // Dropping the senders rejects every waiting caller.
    }
}
