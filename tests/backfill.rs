//! `vault embed pending` against a fake Ollama server.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Batches(Arc<Mutex<Vec<usize>>>);

/// Three dims: "rust" count, "channel" count, and a constant.
async fn embed(State(batches): State<Batches>, Json(body): Json<Value>) -> Json<Value> {
    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_lowercase)).collect())
        .unwrap_or_default();
    batches.0.lock().unwrap().push(inputs.len());

    let embeddings: Vec<Value> = inputs
        .iter()
        .map(|t| json!([t.matches("rust").count() as f64, t.matches("channel").count() as f64, 1.0]))
        .collect();
    Json(json!({"model": body["model"], "embeddings": embeddings}))
}

async fn spawn_fake_ollama(batches: Batches) -> SocketAddr {
    let app = Router::new()
        .route("/api/embed", post(embed))
        .with_state(batches);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn vault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("vault");
    path
}

async fn run_vault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = tokio::task::spawn_blocking(move || {
        Command::new(vault_binary())
            .arg("--config")
            .arg(&config_path)
            .args(&args)
            .env_remove("OPENAI_API_KEY")
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    })
    .await
    .unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_embed_pending_backfills_every_note() {
    let batches = Batches::default();
    let addr = spawn_fake_ollama(batches.clone()).await;

    let tmp = TempDir::new().unwrap();
    let db = format!("[db]\npath = \"{}/vault.sqlite\"\n", tmp.path().display());

    // Notes are written with no provider, so none are embedded on write.
    let plain_config = tmp.path().join("plain.toml");
    fs::write(&plain_config, &db).unwrap();

    let ollama_config = tmp.path().join("ollama.toml");
    fs::write(
        &ollama_config,
        format!(
            "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"fake-embed\"\ndims = 3\nurl = \"http://{}\"\n",
            db, addr
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_vault(&plain_config, &["init"]).await;
    assert!(success, "init failed: {}", stderr);
    for (owner, title, content) in [
        ("1", "Rust ownership", "Rust values have one owner."),
        ("1", "Go channels", "A channel passes values."),
        ("2", "Other user", "Rust for someone else."),
    ] {
        let (stdout, stderr, success) = run_vault(
            &plain_config,
            &["add", "--owner", owner, "--title", title, "--content", content],
        )
        .await;
        assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
        assert!(stdout.contains("embedded: no"));
    }

    let (stdout, stderr, success) =
        run_vault(&ollama_config, &["embed", "pending", "--batch-size", "2"]).await;
    assert!(success, "embed failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("total pending: 3"));
    assert!(stdout.contains("embedded: 3"));
    assert!(stdout.contains("failed: 0"));
    assert_eq!(*batches.0.lock().unwrap(), vec![2, 1]);

    let (stdout, _, success) =
        run_vault(&ollama_config, &["embed", "pending", "--dry-run"]).await;
    assert!(success);
    assert!(stdout.contains("notes needing embeddings: 0"));

    // Vector search only sees embedded notes, so both of owner 1's show up.
    let (stdout, stderr, success) = run_vault(
        &ollama_config,
        &["search", "rust", "--owner", "1", "--top-k", "5", "--json"],
    )
    .await;
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["backend"], "vector");
    let titles: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Rust ownership", "Go channels"]);
}
