// tests/worker_lifecycle.rs
//
// Lifecycle tests for the external classifier process manager, driven
// against the stub worker binary (same line-delimited JSON protocol as the
// production Python worker). Magic item texts: `__crash__` makes the stub
// exit without replying, `__sleep__` makes it swallow the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use newslens::bias::types::{Label, WorkerItem};
use newslens::bias::worker::{WorkerClassifier, WorkerConfig};
use newslens::bias::Classifier;

fn stub_config(timeout_ms: u64) -> WorkerConfig {
    WorkerConfig {
        command: env!("CARGO_BIN_EXE_bias_worker_stub").to_string(),
        args: Vec::new(),
        env: Vec::new(),
        timeout: Duration::from_millis(timeout_ms),
    }
}

fn item(id: &str, text: &str) -> WorkerItem {
    WorkerItem {
        id: id.to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn classifies_a_batch_over_the_stub_worker() {
    let worker = WorkerClassifier::new(stub_config(5_000));
    let out = worker
        .classify(&[item("1", "leaning left"), item("2", "steady coverage")])
        .await
        .expect("stub worker batch");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].id, "1");
    assert_eq!(out[0].validated(), Label::Left);
    assert_eq!(out[1].validated(), Label::Center);
}

#[tokio::test]
async fn concurrent_batches_multiplex_by_correlation_id() {
    let worker = Arc::new(WorkerClassifier::new(stub_config(5_000)));
    let mut handles = Vec::new();
    for i in 0..5 {
        let w = Arc::clone(&worker);
        handles.push(tokio::spawn(async move {
            let id = format!("req-{i}");
            let text = if i % 2 == 0 { "leaning left" } else { "leaning right" };
            (i, w.classify(&[item(&id, text)]).await)
        }));
    }
    for h in handles {
        let (i, res) = h.await.expect("join");
        let out = res.expect("classify");
        assert_eq!(out[0].id, format!("req-{i}"));
        let expected = if i % 2 == 0 { Label::Left } else { Label::Right };
        assert_eq!(out[0].validated(), expected);
    }
}

#[tokio::test]
async fn timeout_resolves_unknown_without_hanging() {
    let worker = WorkerClassifier::new(stub_config(300));
    let started = Instant::now();
    let out = worker
        .classify(&[item("1", "__sleep__"), item("2", "__sleep__")])
        .await
        .expect("timeout must resolve, not reject");
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "soft-fail must respect the deadline"
    );
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| r.validated() == Label::Unknown));
}

#[tokio::test]
async fn crash_rejects_pending_and_next_call_respawns() {
    let worker = Arc::new(WorkerClassifier::new(stub_config(10_000)));

    // Park two requests on the worker, then crash it.
    let w1 = Arc::clone(&worker);
    let parked1 = tokio::spawn(async move { w1.classify(&[item("a", "__sleep__")]).await });
    let w2 = Arc::clone(&worker);
    let parked2 = tokio::spawn(async move { w2.classify(&[item("b", "__sleep__")]).await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let crashed = worker.classify(&[item("c", "__crash__")]).await;
    assert!(crashed.is_err(), "crash batch must reject");

    // Both parked requests settle as errors well before their deadline.
    let r1 = tokio::time::timeout(Duration::from_secs(2), parked1)
        .await
        .expect("parked request must settle")
        .expect("join");
    let r2 = tokio::time::timeout(Duration::from_secs(2), parked2)
        .await
        .expect("parked request must settle")
        .expect("join");
    assert!(r1.is_err() && r2.is_err());

    // A fresh process is spawned transparently.
    let out = worker
        .classify(&[item("d", "leaning right")])
        .await
        .expect("post-crash classify");
    assert_eq!(out[0].validated(), Label::Right);
}

#[tokio::test]
async fn forced_invalid_label_validates_to_unknown() {
    let mut cfg = stub_config(5_000);
    cfg.env = vec![("BIAS_STUB_LABEL".to_string(), "PURPLE".to_string())];
    let worker = WorkerClassifier::new(cfg);
    let out = worker
        .classify(&[item("1", "anything")])
        .await
        .expect("classify");
    assert_eq!(out[0].label.as_deref(), Some("PURPLE"));
    assert_eq!(out[0].validated(), Label::Unknown);
}

#[tokio::test]
async fn unspawnable_worker_command_is_an_error_not_a_hang() {
    let cfg = WorkerConfig {
        command: "/nonexistent/bias-worker".to_string(),
        args: Vec::new(),
        env: Vec::new(),
        timeout: Duration::from_millis(500),
    };
    let worker = WorkerClassifier::new(cfg);
    let res = worker.classify(&[item("1", "text")]).await;
    assert!(res.is_err());
}
