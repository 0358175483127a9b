//! # Note Vault Core
//!
//! Shared retrieval-and-synthesis logic for Note Vault: the note data
//! model, store abstraction, embedding and chat capability traits, the
//! retrieval engine, context assembly, answer synthesis, and offline
//! evaluation metrics.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete backends (SQLite, OpenAI, Ollama) live in the `note-vault`
//! app crate and plug in through the [`store::NoteStore`],
//! [`embedding::EmbeddingProvider`], and [`chat::ChatBackend`] traits.
//!
//! ## Pipeline
//!
//! ```text
//! query ──▶ EmbeddingProvider ──▶ RetrievalEngine ──▶ context::assemble ──▶ AnswerSynthesizer
//!                                  (vector | keyword)     {context, citations}     {answer, citations}
//! ```

pub mod chat;
pub mod context;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod metrics;
pub mod models;
pub mod rag;
pub mod search;
pub mod store;

pub use error::{Error, Result};
