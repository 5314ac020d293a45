//! Development stand-in for the Python classifier worker.
//!
//! Speaks the same line-delimited JSON protocol over stdio:
//! request `{"id": "...", "items": [{"id": "...", "text": "..."}]}`,
//! response `{"id": "...", "results": [{"id": "...", "label": "..."}]}`.
//!
//! Labels come from a trivial keyword heuristic, or from `BIAS_STUB_LABEL`
//! when set (any string, including invalid labels, is echoed verbatim so
//! validation paths can be exercised). Two magic item texts drive lifecycle
//! tests: `__crash__` exits without replying, `__sleep__` swallows the
//! request silently.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct Request {
    id: String,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    id: String,
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct Response<'a> {
    id: &'a str,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    id: String,
    label: String,
}

fn label_for(text: &str) -> String {
    if let Ok(forced) = std::env::var("BIAS_STUB_LABEL") {
        return forced;
    }
    let lower = text.to_ascii_lowercase();
    if lower.contains("left") {
        "LEFT".to_string()
    } else if lower.contains("right") {
        "RIGHT".to_string()
    } else {
        "CENTER".to_string()
    }
}

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("stub: unparseable request: {e}");
                continue;
            }
        };

        if req.items.iter().any(|it| it.text == "__crash__") {
            eprintln!("stub: crashing on request {}", req.id);
            std::process::exit(1);
        }
        if req.items.iter().any(|it| it.text == "__sleep__") {
            eprintln!("stub: swallowing request {}", req.id);
            continue;
        }

        let resp = Response {
            id: &req.id,
            results: req
                .items
                .into_iter()
                .map(|it| ResultItem {
                    label: label_for(&it.text),
                    id: it.id,
                })
                .collect(),
        };
        let mut out = stdout.lock();
        if serde_json::to_writer(&mut out, &resp).is_err() {
            break;
        }
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}
