//! Offline retrieval-quality metrics.
//!
//! Pure functions over already-computed rankings: Precision@K, Recall@K,
//! Mean Reciprocal Rank, and [`evaluate_retrieval`], which averages them
//! over a labelled query set. Nothing here performs I/O; the driver that
//! replays queries against a live engine lives in the app crate.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::NoteId;

/// `|retrieved[..k] ∩ relevant| / k`. Zero when `k == 0` or nothing was retrieved.
pub fn precision_at_k(retrieved: &[NoteId], relevant: &HashSet<NoteId>, k: usize) -> f64 {
    if k == 0 || retrieved.is_empty() {
        return 0.0;
    }
    hits_in_top_k(retrieved, relevant, k) as f64 / k as f64
}

/// `|retrieved[..k] ∩ relevant| / |relevant|`. Zero when `relevant` is empty or `k == 0`.
pub fn recall_at_k(retrieved: &[NoteId], relevant: &HashSet<NoteId>, k: usize) -> f64 {
    if relevant.is_empty() || k == 0 {
        return 0.0;
    }
    hits_in_top_k(retrieved, relevant, k) as f64 / relevant.len() as f64
}

fn hits_in_top_k(retrieved: &[NoteId], relevant: &HashSet<NoteId>, k: usize) -> usize {
    retrieved
        .iter()
        .take(k)
        .filter(|id| relevant.contains(id))
        .count()
}

/// 1-based rank of the first retrieved id that is relevant.
pub fn first_relevant_rank(retrieved: &[NoteId], relevant: &HashSet<NoteId>) -> Option<usize> {
    retrieved
        .iter()
        .position(|id| relevant.contains(id))
        .map(|i| i + 1)
}

/// Mean over queries of `1 / rank` of the first relevant hit (0 when none).
///
/// Empty input or sequences of different lengths yield `0.0`.
pub fn mrr(retrieved_lists: &[Vec<NoteId>], relevant_sets: &[HashSet<NoteId>]) -> f64 {
    if retrieved_lists.is_empty() || retrieved_lists.len() != relevant_sets.len() {
        return 0.0;
    }
    let total: f64 = retrieved_lists
        .iter()
        .zip(relevant_sets)
        .map(|(retrieved, relevant)| {
            first_relevant_rank(retrieved, relevant)
                .map(|rank| 1.0 / rank as f64)
                .unwrap_or(0.0)
        })
        .sum();
    total / retrieved_lists.len() as f64
}

/// Run-level averages for one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub mrr: f64,
    pub latency_ms: f64,
    pub k: usize,
    pub total_queries: usize,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    /// Build a result; `timestamp` defaults to now.
    pub fn new(
        precision_at_k: f64,
        recall_at_k: f64,
        mrr: f64,
        latency_ms: f64,
        k: usize,
        total_queries: usize,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            precision_at_k,
            recall_at_k,
            mrr,
            latency_ms,
            k,
            total_queries,
            timestamp: timestamp.unwrap_or_else(Utc::now),
        }
    }

    /// Flat record for persistence: metrics rounded to 4 places, latency
    /// to 2, ISO-8601 timestamp.
    pub fn to_record(&self) -> EvaluationRecord {
        EvaluationRecord {
            precision_at_k: round_to(self.precision_at_k, 4),
            recall_at_k: round_to(self.recall_at_k, 4),
            mrr: round_to(self.mrr, 4),
            latency_ms: round_to(self.latency_ms, 2),
            k: self.k,
            total_queries: self.total_queries,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Serialized form of an [`EvaluationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub mrr: f64,
    pub latency_ms: f64,
    pub k: usize,
    pub total_queries: usize,
    pub timestamp: String,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Average Precision@K and Recall@K, global MRR, and mean latency over a
/// labelled query set.
///
/// `queries`, `retrieved_results`, and `ground_truth` are parallel and must
/// have the same non-zero length; otherwise this fails with
/// [`Error::Validation`] and no partial result. Latency is `0.0` when none
/// is supplied.
pub fn evaluate_retrieval(
    queries: &[String],
    retrieved_results: &[Vec<NoteId>],
    ground_truth: &[HashSet<NoteId>],
    k: usize,
    latencies: Option<&[f64]>,
) -> Result<EvaluationResult> {
    if queries.is_empty() {
        return Err(Error::validation("no queries to evaluate"));
    }
    if queries.len() != retrieved_results.len() || queries.len() != ground_truth.len() {
        return Err(Error::validation(format!(
            "queries, results, and ground truth must have the same length (got {}, {}, {})",
            queries.len(),
            retrieved_results.len(),
            ground_truth.len()
        )));
    }

    let n = queries.len() as f64;
    let avg_precision = retrieved_results
        .iter()
        .zip(ground_truth)
        .map(|(r, rel)| precision_at_k(r, rel, k))
        .sum::<f64>()
        / n;
    let avg_recall = retrieved_results
        .iter()
        .zip(ground_truth)
        .map(|(r, rel)| recall_at_k(r, rel, k))
        .sum::<f64>()
        / n;

    let avg_latency = match latencies {
        Some(l) if !l.is_empty() => l.iter().sum::<f64>() / l.len() as f64,
        _ => 0.0,
    };

    Ok(EvaluationResult::new(
        avg_precision,
        avg_recall,
        mrr(retrieved_results, ground_truth),
        avg_latency,
        k,
        queries.len(),
        None,
    ))
}
