//! # Contact Search CLI (`csearch`)
//!
//! ## Usage
//!
//! ```bash
//! csearch --config ./config/csearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csearch parse "<query>"` | Show how a query is understood |
//! | `csearch search "<query>"` | Rank contacts for a query |
//! | `csearch serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! csearch parse "hot investors at acme" --json
//! csearch search "warm leads from referral this quarter" --limit 5
//! csearch search "people who fund robotics" --remote
//! csearch serve --config ./config/csearch.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contact_search::config::{self, Config};
use contact_search::search::{self, SearchOptions};
use contact_search::server;

/// Contact Search CLI: hybrid deterministic and remote search over a
/// contact snapshot.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/csearch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "csearch",
    about = "Contact Search: intent-aware search over a contact snapshot",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query into intents and free text.
    Parse {
        query: String,

        /// Print the structured query as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search the snapshot.
    ///
    /// Prints the deterministic results, then with `--remote` the
    /// remote-backed results (or a notice that the remote path failed).
    Search {
        query: String,

        /// Also run the remote semantic path.
        #[arg(long)]
        remote: bool,

        /// One JSON object per result set on stdout.
        #[arg(long)]
        json: bool,

        /// Maximum results to show (default: `[retrieval].final_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg);

    match cli.command {
        Commands::Parse { query, json } => {
            search::run_parse(&cfg, &query, json)?;
        }
        Commands::Search {
            query,
            remote,
            json,
            limit,
        } => {
            search::run_search(
                &cfg,
                &query,
                SearchOptions {
                    remote,
                    json,
                    limit,
                },
            )
            .await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
