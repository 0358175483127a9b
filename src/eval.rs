//! Retrieval evaluation driver (`vault eval`).
//!
//! Replays a labelled dataset against a retrieval backend, times each
//! query end to end, and reports Precision@K, Recall@K, MRR and mean
//! latency. Two backends implement [`QueryRunner`]:
//!
//! - [`HttpQueryRunner`]: logs in to a running Note Vault API and calls
//!   `GET /api/v1/search/` with a bearer token.
//! - [`LocalQueryRunner`]: calls the local [`RetrievalEngine`] directly.
//!
//! Queries run one at a time in dataset order.
//!
//! Dataset format:
//!
//! ```json
//! [
//!   {"query": "how does ownership work", "relevant_note_ids": [3, 7]},
//!   {"query": "grocery list", "relevant_note_ids": [12]}
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use note_vault_core::metrics::{evaluate_retrieval, EvaluationResult};
use note_vault_core::models::{NoteId, UserId};
use note_vault_core::search::RetrievalEngine;

use crate::config::Config;
use crate::search::open_engine;

pub const DEFAULT_EMAIL: &str = "test@example.com";
pub const DEFAULT_PASSWORD: &str = "testpass123";

/// One labelled query.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EvalCase {
    pub query: String,
    pub relevant_note_ids: Vec<NoteId>,
}

pub fn load_dataset(path: &Path) -> Result<Vec<EvalCase>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Dataset file '{}' not found or unreadable", path.display()))?;
    let dataset: Vec<EvalCase> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;

    if dataset.is_empty() {
        bail!("Dataset must include at least one query.");
    }
    Ok(dataset)
}

/// Runs one query and returns ranked note ids.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, query: &str, k: usize) -> Result<Vec<NoteId>>;
}

// ============ HTTP runner ============

pub struct HttpQueryRunner {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpQueryRunner {
    /// Authenticate once with `POST {base_url}/api/v1/auth/login`.
    pub async fn login(base_url: &str, email: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/api/v1/auth/login", base_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Authentication failed ({}): {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        let token = json
            .get("access_token")
            .and_then(|t| t.as_str())
            .context("Authentication response has no access_token")?
            .to_string();

        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl QueryRunner for HttpQueryRunner {
    async fn run_query(&self, query: &str, k: usize) -> Result<Vec<NoteId>> {
        let response = self
            .client
            .get(format!("{}/api/v1/search/", self.base_url))
            .query(&[("query", query.to_string()), ("top_k", k.to_string())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                event = "evaluation_query",
                status = status.as_u16(),
                query_length = query.chars().count(),
                "search request failed"
            );
            return Ok(Vec::new());
        }

        let json: serde_json::Value = response.json().await?;
        Ok(extract_note_ids(&json))
    }
}

/// Ids from a search response: a list of results (or `{"results": [...]}`),
/// each carrying `note_id` or a nested `note.id`.
pub fn extract_note_ids(json: &serde_json::Value) -> Vec<NoteId> {
    let items = json
        .as_array()
        .or_else(|| json.get("results").and_then(|r| r.as_array()));

    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("note_id")
                        .or_else(|| item.pointer("/note/id"))
                        .and_then(|id| id.as_i64())
                })
                .collect()
        })
        .unwrap_or_default()
}

// ============ Local runner ============

pub struct LocalQueryRunner {
    engine: RetrievalEngine,
    owner: UserId,
}

impl LocalQueryRunner {
    pub fn new(engine: RetrievalEngine, owner: UserId) -> Self {
        Self { engine, owner }
    }
}

#[async_trait]
impl QueryRunner for LocalQueryRunner {
    async fn run_query(&self, query: &str, k: usize) -> Result<Vec<NoteId>> {
        let results = self.engine.search(query, self.owner, k).await?;
        Ok(results.iter().map(|r| r.note_id).collect())
    }
}

// ============ Driver ============

/// Replay `dataset` through `runner` and compute the run's metrics.
pub async fn evaluate(
    runner: &dyn QueryRunner,
    dataset: &[EvalCase],
    k: usize,
) -> Result<EvaluationResult> {
    let total = dataset.len();
    let mut queries = Vec::with_capacity(total);
    let mut retrieved = Vec::with_capacity(total);
    let mut ground_truth = Vec::with_capacity(total);
    let mut latencies = Vec::with_capacity(total);

    for (i, case) in dataset.iter().enumerate() {
        let start = Instant::now();
        let ids = runner.run_query(&case.query, k).await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

        tracing::info!(
            event = "evaluation_query",
            index = i + 1,
            total,
            results_count = ids.len(),
            latency_ms,
        );
        println!(
            "  [{}/{}] Query: '{}' | Latency: {:.2}ms",
            i + 1,
            total,
            preview(&case.query, 50),
            latency_ms
        );

        queries.push(case.query.clone());
        ground_truth.push(case.relevant_note_ids.iter().copied().collect::<HashSet<_>>());
        retrieved.push(ids);
        latencies.push(latency_ms);
    }

    Ok(evaluate_retrieval(
        &queries,
        &retrieved,
        &ground_truth,
        k,
        Some(&latencies),
    )?)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

pub fn print_report(result: &EvaluationResult) {
    let rule = "=".repeat(60);
    println!();
    println!("{}", rule);
    println!("EVALUATION RESULTS");
    println!("{}", rule);
    println!("Total Queries:     {}", result.total_queries);
    println!("K:                 {}", result.k);
    println!();
    println!("Retrieval Metrics:");
    println!("  Precision@{}:    {:.4}", result.k, result.precision_at_k);
    println!("  Recall@{}:       {:.4}", result.k, result.recall_at_k);
    println!("  MRR:             {:.4}", result.mrr);
    println!();
    println!("Performance:");
    println!("  Avg Latency:     {:.2} ms", result.latency_ms);
    println!();
    println!("Timestamp:         {}", result.timestamp.to_rfc3339());
    println!("{}", rule);
    println!();
}

pub fn save_results(result: &EvaluationResult, output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&result.to_record())?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write results to {}", output.display()))?;
    println!("Results saved to {}", output.display());
    Ok(())
}

/// Options for `vault eval`; `None` falls back to `[evaluation]` config.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub dataset: PathBuf,
    pub k: Option<usize>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<String>,
    pub output: Option<PathBuf>,
    /// Evaluate the local engine for this owner instead of an HTTP server.
    pub local_owner: Option<UserId>,
}

pub async fn run_eval(config: &Config, opts: EvalOptions) -> Result<()> {
    let k = opts.k.unwrap_or(config.evaluation.k);
    if k < 1 {
        bail!("--k must be >= 1");
    }
    let output = opts
        .output
        .unwrap_or_else(|| config.evaluation.output.clone());

    println!(
        "Loading evaluation dataset from {}...",
        opts.dataset.display()
    );
    let dataset = load_dataset(&opts.dataset)?;
    println!("Loaded {} evaluation queries", dataset.len());
    println!();

    let runner: Box<dyn QueryRunner> = match opts.local_owner {
        Some(owner) => {
            let engine = open_engine(config).await?;
            println!("Evaluating local {} retrieval for owner {}", engine.backend(), owner);
            Box::new(LocalQueryRunner::new(engine, owner))
        }
        None => {
            let base_url = opts
                .base_url
                .unwrap_or_else(|| config.evaluation.base_url.clone());
            let email = opts.email.unwrap_or_else(|| DEFAULT_EMAIL.to_string());
            let password = opts
                .password
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
            println!("Authenticating against {}...", base_url);
            let runner = HttpQueryRunner::login(&base_url, &email, &password).await?;
            println!("Authenticated");
            Box::new(runner)
        }
    };
    println!();

    println!("Running evaluation (k={})...", k);
    let result = evaluate(runner.as_ref(), &dataset, k).await?;

    print_report(&result);
    save_results(&result, &output)?;
    Ok(())
}
