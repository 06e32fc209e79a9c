//! # Lookup Cache CLI (`lkc`)
//!
//! Builds and queries per-job word-lookup caches.
//!
//! ## Usage
//!
//! ```bash
//! lkc --config ./config/lkc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lkc build <job> --sentences <file>` | Look up uncached words and add them to the job's cache |
//! | `lkc link <job> --timing <file> --chunk <id>` | Attach audio references from a timing file |
//! | `lkc summary <job>` | Print the cache summary |
//! | `lkc export <job>` | Print the full cache document |
//! | `lkc get <job> <word>` | Print one word's entry |
//! | `lkc bulk <job> <word>...` | Print several words' entries with hit/miss counts |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default
//! `lookup_cache=info`). Command output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lookup_cache::build_cmd::{self, BuildArgs};
use lookup_cache::config;
use lookup_cache::query;

/// Lookup cache CLI: precomputed word definitions linked to audio.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "lkc",
    about = "Build and query job-scoped word-lookup caches",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lkc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up every uncached word of a sentence file.
    ///
    /// The cache is saved after each batch, so an interrupted build can be
    /// resumed by running the same command again.
    Build {
        /// Job identifier (directory name under `storage.jobs_root`).
        job: String,

        /// JSON array of sentences, or plain text with one sentence per line.
        #[arg(long)]
        sentences: PathBuf,

        /// Language of the sentences. Required for a new cache.
        #[arg(long)]
        input_language: Option<String>,

        /// Language definitions are written in.
        #[arg(long)]
        definition_language: Option<String>,

        /// Override `lookup.batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override `lookup.min_word_length`.
        #[arg(long)]
        min_word_length: Option<usize>,

        /// Look up stopwords too.
        #[arg(long)]
        keep_stopwords: bool,

        /// Progress output: off, human, or json. Defaults to human on a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Attach audio references from a timing-track file.
    Link {
        job: String,

        /// JSON object mapping track name to timing tokens.
        #[arg(long)]
        timing: PathBuf,

        /// Chunk the timing tokens belong to.
        #[arg(long)]
        chunk: String,
    },

    /// Print the cache summary as JSON.
    Summary { job: String },

    /// Print the full cache document as JSON.
    Export { job: String },

    /// Print one word's entry as JSON.
    Get { job: String, word: String },

    /// Print entries for several words as JSON.
    Bulk {
        job: String,
        #[arg(required = true)]
        words: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lookup_cache=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            job,
            sentences,
            input_language,
            definition_language,
            batch_size,
            min_word_length,
            keep_stopwords,
            progress,
        } => {
            let args = BuildArgs {
                input_language,
                definition_language,
                batch_size,
                min_word_length,
                keep_stopwords,
                progress,
            };
            build_cmd::run_build(&cfg, &job, &sentences, &args).await?;
        }
        Commands::Link { job, timing, chunk } => {
            build_cmd::run_link(&cfg, &job, &timing, &chunk)?;
        }
        Commands::Summary { job } => {
            query::run_summary(&cfg, &job)?;
        }
        Commands::Export { job } => {
            query::run_export(&cfg, &job)?;
        }
        Commands::Get { job, word } => {
            query::run_get(&cfg, &job, &word)?;
        }
        Commands::Bulk { job, words } => {
            query::run_bulk(&cfg, &job, &words)?;
        }
    }

    Ok(())
}
