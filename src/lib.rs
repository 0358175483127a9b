//! # Note Vault
//!
//! Personal notes with semantic search and retrieval-augmented answers.
//!
//! The retrieval and synthesis pipeline lives in `note_vault_core`; this
//! crate wires it to SQLite, the OpenAI/Ollama HTTP APIs, and the `vault`
//! command line.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ vault add │──▶│ index_note   │──▶│   SQLite     │
//! │ vault edit│   │ (embed)      │   │ notes+BLOBs  │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │
//!                   ┌──────────────────────┤
//!                   ▼                      ▼
//!            ┌──────────────┐       ┌──────────────┐
//!            │ vault search │       │  vault ask   │
//!            │ (retrieval)  │       │ (RAG answer) │
//!            └──────────────┘       └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite note store |
//! | [`embedding`] | OpenAI and Ollama embedding providers |
//! | [`chat`] | OpenAI-compatible chat backend |
//! | [`notes`] | Add and edit notes |
//! | [`search`] | Retrieval command |
//! | [`ask`] | Answer command |
//! | [`embed_cmd`] | Embedding backfill |
//! | [`eval`] | Retrieval evaluation driver |

pub mod ask;
pub mod chat;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod eval;
pub mod logging;
pub mod migrate;
pub mod notes;
pub mod search;
pub mod sqlite_store;
