//! # Note Vault CLI (`vault`)
//!
//! ## Usage
//!
//! ```bash
//! vault --config ./config/vault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vault init` | Create the SQLite database and run schema migrations |
//! | `vault add` | Add a note and embed it |
//! | `vault edit <id>` | Update a note, re-embedding when its text changed |
//! | `vault search "<query>"` | Rank an owner's notes for a query |
//! | `vault ask "<question>"` | Answer a question from an owner's notes, with citations |
//! | `vault embed pending` | Backfill missing embeddings |
//! | `vault eval` | Measure retrieval quality against a labelled dataset |
//!
//! ## Examples
//!
//! ```bash
//! vault init
//! vault add --owner 1 --title "Rust ownership" --content "Each value has one owner." --tag rust
//! vault search "ownership" --owner 1 --top-k 3
//! vault ask "What did I write about ownership?" --owner 1
//! vault eval --dataset data/eval_queries.json --local --owner 1
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use note_vault::sqlite_store::NoteUpdate;
use note_vault::{ask, config, embed_cmd, eval, logging, migrate, notes, search};

#[derive(Parser)]
#[command(
    name = "vault",
    about = "Note Vault: personal notes with semantic search and grounded answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Add a note and generate its embedding.
    Add {
        /// Owning user id.
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Tag to attach; repeat for several.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Update a note. Changing title or content regenerates its embedding.
    Edit {
        id: i64,
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Replacement tag set; repeat for several.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove every tag from the note.
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },

    /// Rank an owner's notes for a query.
    ///
    /// Uses vector similarity when the store supports it, keyword
    /// matching otherwise.
    Search {
        query: String,
        #[arg(long)]
        owner: i64,
        /// Number of results (1 to `retrieval.max_top_k`).
        #[arg(long)]
        top_k: Option<usize>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from an owner's notes, with numbered citations.
    Ask {
        question: String,
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        json: bool,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Evaluate retrieval quality against a labelled dataset.
    ///
    /// By default queries a running Note Vault API; `--local` replays the
    /// dataset against this database instead.
    Eval {
        /// JSON array of `{"query", "relevant_note_ids"}`.
        #[arg(long, default_value = "data/eval_queries.json")]
        dataset: PathBuf,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        /// Where to write the JSON results.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Evaluate the local retrieval engine instead of an HTTP server.
        #[arg(long, requires = "owner")]
        local: bool,
        /// Owner whose notes are searched with `--local`.
        #[arg(long)]
        owner: Option<i64>,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed notes that have no embedding.
    Pending {
        /// Maximum number of notes to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            owner,
            title,
            content,
            tags,
        } => {
            notes::run_add(&cfg, owner, &title, &content, tags).await?;
        }
        Commands::Edit {
            id,
            owner,
            title,
            content,
            tags,
            clear_tags,
        } => {
            let update = NoteUpdate {
                title,
                content,
                tags: (clear_tags || !tags.is_empty()).then_some(tags),
            };
            notes::run_edit(&cfg, id, owner, update).await?;
        }
        Commands::Search {
            query,
            owner,
            top_k,
            json,
        } => {
            search::run_search(&cfg, &query, owner, top_k, json).await?;
        }
        Commands::Ask {
            question,
            owner,
            json,
        } => {
            ask::run_ask(&cfg, &question, owner, json).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
        },
        Commands::Eval {
            dataset,
            k,
            email,
            password,
            base_url,
            output,
            local,
            owner,
        } => {
            let opts = eval::EvalOptions {
                dataset,
                k,
                email,
                password,
                base_url,
                output,
                local_owner: if local { owner } else { None },
            };
            eval::run_eval(&cfg, opts).await?;
        }
    }

    Ok(())
}
