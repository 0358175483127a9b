//! Answer synthesis: retrieve, assemble, generate.
//!
//! [`AnswerSynthesizer::answer`] runs the retrieval engine with the
//! configured `top_k`, assembles a numbered context, and asks the chat
//! backend for an answer grounded in that context. Citations are returned
//! as soon as retrieval succeeds, even when generation is skipped because
//! the chat backend is not configured. A generation failure is an
//! [`Error::AiService`], never a degraded answer.

use std::sync::Arc;

use serde::Serialize;

use crate::chat::{ChatBackend, ChatMessage, ChatRequest};
use crate::context::assemble;
use crate::error::{Error, Result};
use crate::models::{Citation, UserId};
use crate::search::{RetrievalEngine, DEFAULT_TOP_K};

pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant notes to answer your question.";

pub const NOT_CONFIGURED_ANSWER: &str =
    "AI service is not configured. Please set OPENAI_API_KEY.";

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on personal notes.";

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A generated answer and the notes it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Generation settings for [`AnswerSynthesizer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    pub top_k: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

pub struct AnswerSynthesizer {
    engine: RetrievalEngine,
    chat: Arc<dyn ChatBackend>,
    params: SynthesisParams,
}

impl AnswerSynthesizer {
    pub fn new(engine: RetrievalEngine, chat: Arc<dyn ChatBackend>, params: SynthesisParams) -> Self {
        Self {
            engine,
            chat,
            params,
        }
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// Answer `query` from `owner`'s notes.
    pub async fn answer(&self, query: &str, owner: UserId) -> Result<Answer> {
        let results = self.engine.search(query, owner, self.params.top_k).await?;
        if results.is_empty() {
            return Ok(Answer {
                answer: NO_RESULTS_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let assembled = assemble(&results);

        if !self.chat.is_configured() {
            return Ok(Answer {
                answer: NOT_CONFIGURED_ANSWER.to_string(),
                citations: assembled.citations,
            });
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(&assembled.context, query)),
            ],
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
        };

        let answer = match self.chat.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event = "rag_generation_failed", error = %e, user_id = owner);
                return Err(Error::ai_service(format!("failed to generate answer: {}", e)));
            }
        };

        tracing::info!(
            event = "rag_completed",
            user_id = owner,
            model = self.chat.model_name(),
            citations_count = assembled.citations.len(),
        );

        Ok(Answer {
            answer,
            citations: assembled.citations,
        })
    }
}

/// The user prompt: the numbered context, the question, and grounding rules.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on the user's personal notes.

Context from notes:
{context}

User question: {query}

Instructions:
- Answer the question using ONLY information from the provided notes
- Reference notes using [1], [2], etc. when citing information
- If the notes don't contain enough information, say so
- Be concise and accurate

Answer:"
    )
}
