//! Referral tree command line interface
//!
//! Loads a network snapshot (JSON) and prints layout, statistics, search
//! results or a full export as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Layout with two members opened
//! reftree layout --file network.json --expand m-17 --expand m-42
//!
//! # Subtree statistics for one member
//! reftree stats --file network.json --id m-17
//!
//! # Find by referral code and show the revealed layout
//! reftree search --file network.json --code JANE2024
//!
//! # Download the whole network
//! reftree export --file network.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use referral_tree::{
    EngineConfig, MemberId, NetworkView, RemoteOutcome, SearchQuery, SnapshotSource,
};

#[derive(Parser)]
#[command(name = "reftree")]
#[command(version = "0.1.0")]
#[command(about = "Referral network layout, statistics and search over a JSON snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Snapshot file (nested JSON as delivered by the hierarchy API)
    #[arg(long, short, global = true, env = "REFTREE_SNAPSHOT")]
    file: Option<PathBuf>,

    /// Member to root the view at (defaults to the snapshot root)
    #[arg(long, global = true)]
    root: Option<String>,

    /// YAML configuration file
    #[arg(long, global = true, env = "REFTREE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute node positions and edges
    Layout {
        /// Member ids to open (repeatable)
        #[arg(long)]
        expand: Vec<String>,

        /// Open every member
        #[arg(long)]
        expand_all: bool,
    },

    /// Print aggregates and per-level breakdown
    Stats {
        /// Member id (defaults to the root)
        #[arg(long)]
        id: Option<String>,
    },

    /// Locate a member and print the revealed layout
    Search {
        /// Free text matched against display names
        query: String,

        /// Treat the query as an exact referral code
        #[arg(long)]
        code: bool,
    },

    /// Export the network with aggregates
    Export,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;

    let path = cli
        .file
        .as_ref()
        .context("no snapshot given (use --file or REFTREE_SNAPSHOT)")?;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let source = SnapshotSource::from_json(&json)?;

    let root = match cli.root {
        Some(id) => MemberId::from(id),
        None => source.root_id().context("snapshot has no root member")?,
    };

    let mut view = NetworkView::new(config);
    let report = view
        .load_from(&source, &root)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;
    for warning in &report.truncated {
        tracing::info!(
            id = %warning.id,
            reported = warning.reported,
            materialized = warning.materialized,
            "referrals not fetched"
        );
    }

    let output = match cli.command {
        Commands::Layout { expand, expand_all } => {
            if expand_all {
                view.expand_all()?;
            }
            for id in expand {
                view.expand(&MemberId::from(id))?;
            }
            serde_json::to_value(view.layout()?)?
        }
        Commands::Stats { id } => {
            let id = id.map(MemberId::from).unwrap_or(report.root_id.clone());
            let aggregate = view
                .aggregate(&id)?
                .copied()
                .with_context(|| format!("member '{}' is not in this network", id))?;
            serde_json::json!({
                "id": id,
                "aggregate": aggregate,
                "levels": view.levels(&id)?,
                "truncated": report.truncated,
            })
        }
        Commands::Search { query, code } => {
            let query = if code {
                SearchQuery::code(query)
            } else {
                SearchQuery::new(query, view.config().search.default_mode)
            };
            let outcome = view.locate_remote(&source, &query).await?;
            if matches!(outcome, RemoteOutcome::NotFound) {
                eprintln!("not found in your network");
            }
            serde_json::json!({
                "outcome": outcome,
                "highlight": view.highlight(),
                "layout": view.layout()?,
            })
        }
        Commands::Export => serde_json::to_value(view.export()?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
