//! Context and citation assembly.
//!
//! Turns ranked [`RetrievalResult`]s into the numbered context block that
//! is handed to the chat model and the citation list shown to the user.
//! Block `[i]` in the context and `citations[i - 1]` always describe the
//! same note; the `[i]` markers are what the model is told to cite.

use crate::models::{Citation, RetrievalResult};

/// Output of [`assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// `"[i] {title}\n{content}\n"` blocks in rank order, separated by a blank line.
    pub context: String,
    /// One citation per block, same order.
    pub citations: Vec<Citation>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Format one context block for the result at 1-based `rank`.
pub fn context_block(rank: usize, result: &RetrievalResult) -> String {
    format!("[{}] {}\n{}\n", rank, result.title, result.content)
}

/// Build the numbered context and the aligned citation list.
pub fn assemble(results: &[RetrievalResult]) -> AssembledContext {
    let blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, r)| context_block(i + 1, r))
        .collect();

    AssembledContext {
        context: blocks.join("\n"),
        citations: results.iter().map(Citation::from).collect(),
    }
}
