//! # Faculty Federation CLI (`fedx`)
//!
//! Without a subcommand `fedx` runs the four-phase pipeline: scrape every
//! eligible tenant, enrich against OpenAlex, build the federation index, and
//! write a run summary. Subcommands read the persisted index.
//!
//! ## Usage
//!
//! ```bash
//! fedx --config ./config/federation.toml [--verbose] [--skip-scrape] [--skip-enrichment] [--tenants a,b]
//! fedx --config ./config/federation.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fedx` | Run scrape → enrich → index → summary |
//! | `fedx search "<query>"` | Filtered, scored search over the index |
//! | `fedx stats` | Coverage and distribution statistics |
//! | `fedx topic <topic>` | Profiles whose topics or interests mention a topic |
//! | `fedx institution <slug>` | All profiles of one tenant |
//! | `fedx tenants` | Configured tenants and which phases apply |
//!
//! ## Examples
//!
//! ```bash
//! # Full run
//! fedx --config ./config/federation.toml
//!
//! # Re-run enrichment and indexing for two tenants from saved raw records
//! fedx --skip-scrape --tenants gsu,emory
//!
//! # Rebuild only the index
//! fedx --skip-scrape --skip-enrichment
//!
//! # Neuroscience faculty with an h-index of at least 20, as JSON
//! fedx search "neuroscience" --type faculty --min-h-index 20 --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use faculty_federation::authority::OpenAlexClient;
use faculty_federation::directory::HttpPageSource;
use faculty_federation::pipeline::{Pipeline, RunOptions};
use faculty_federation::{config, federation, logging};
use federation_core::index::SearchQuery;
use federation_core::models::PersonType;

/// Faculty Federation CLI: harvest faculty directories, resolve people
/// against OpenAlex, and search the merged federation index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/federation.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fedx",
    about = "Faculty Federation: multi-tenant faculty directory harvesting and federated search",
    version,
    long_about = "Faculty Federation crawls the public faculty directories of participating \
    institutions, resolves each person against the OpenAlex scholarly graph with confidence \
    scoring, and merges the results into one searchable federation index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/federation.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Reuse raw records from the last scrape instead of crawling.
    #[arg(long)]
    skip_scrape: bool,

    /// Reuse enrichment results from the last run instead of querying OpenAlex.
    #[arg(long)]
    skip_enrichment: bool,

    /// Only scrape and enrich these tenants (comma-separated slugs).
    #[arg(long, value_delimiter = ',')]
    tenants: Option<Vec<String>>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the federation index.
    ///
    /// Filters apply first, then the query is scored and sorted, then
    /// `--offset`/`--limit` select the page.
    Search {
        /// Free-text query. Omit to list every profile passing the filters.
        query: Option<String>,

        /// Restrict to a tenant slug (repeatable).
        #[arg(long = "tenant")]
        tenants: Vec<String>,

        /// Restrict to a person type, e.g. `faculty`, `postdoc` (repeatable).
        #[arg(long = "type")]
        person_types: Vec<PersonType>,

        /// Department substring, any of which must match (repeatable).
        #[arg(long = "department")]
        departments: Vec<String>,

        /// Minimum h-index.
        #[arg(long)]
        min_h_index: Option<u32>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats {
        /// Print statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find profiles by topic or research interest.
    Topic { topic: String },

    /// List all profiles of one tenant.
    Institution { slug: String },

    /// List configured tenants.
    Tenants,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        None => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, finishing current work");
                    on_signal.cancel();
                }
            });

            let pages = Arc::new(HttpPageSource::new()?);
            let authority = Arc::new(OpenAlexClient::new(&cfg.authority)?);
            let pipeline = Pipeline::new(cfg, pages, authority, cancel);
            let options = RunOptions {
                skip_scrape: cli.skip_scrape,
                skip_enrichment: cli.skip_enrichment,
                tenants: cli.tenants,
            };
            let summary = pipeline.run(&options).await?;
            federation::print_run_summary(&summary);
        }
        Some(Commands::Search {
            query,
            tenants,
            person_types,
            departments,
            min_h_index,
            offset,
            limit,
            json,
        }) => {
            let query = SearchQuery {
                text: query,
                tenants,
                person_types,
                departments,
                min_h_index,
                offset,
                limit: Some(limit),
            };
            federation::run_search(&cfg, &query, json)?;
        }
        Some(Commands::Stats { json }) => {
            federation::run_stats(&cfg, json)?;
        }
        Some(Commands::Topic { topic }) => {
            federation::run_topic(&cfg, &topic)?;
        }
        Some(Commands::Institution { slug }) => {
            federation::run_institution(&cfg, &slug)?;
        }
        Some(Commands::Tenants) => {
            federation::list_tenants(&cfg);
        }
    }

    Ok(())
}
