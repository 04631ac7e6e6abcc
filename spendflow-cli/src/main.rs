use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use spendflow_core::{
    SankeyLink, SankeyNode, TransactionRecord, build_hierarchy, calculate_links, detect_recurring,
};
use spendflow_ingest::{AggregatorTransaction, read_csv_rows, records_from_aggregator};
use spendflow_llm::{AnyProvider, Categorizer, LlmProvider, ProviderConfig};

mod config;
mod persist;

#[derive(Parser, Debug)]
#[command(
    name = "spendflow",
    version,
    about = "Categorize bank statements into a Sankey spend graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Categorize a statement CSV with the configured LLM and emit
    /// {nodes, links} JSON
    Categorize {
        /// Path to the statement CSV
        input: PathBuf,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the durable node shape (nodes + parent/child map)
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },

    /// Build the graph from already-fetched aggregator transactions
    /// (JSON array), using their category hints instead of the LLM
    Sync {
        /// Path to a JSON file of aggregator transactions
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the durable node shape (nodes + parent/child map)
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },

    /// Detect recurring charges in a JSON array of transaction records
    Recurring {
        input: PathBuf,

        /// Only print groups at or above this confidence (0-1)
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,
    },

    /// Probe the configured LLM provider
    TestConnection,

    /// Write a default ~/.spendflow/config.toml
    InitConfig,
}

#[derive(Serialize)]
struct SankeyData<'a> {
    nodes: &'a [SankeyNode],
    links: &'a [SankeyLink],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Categorize {
            input,
            output,
            store,
            pretty,
        } => cmd_categorize(input, output, store, pretty).await,
        Command::Sync {
            input,
            output,
            store,
            pretty,
        } => cmd_sync(input, output, store, pretty),
        Command::Recurring {
            input,
            min_confidence,
        } => cmd_recurring(input, min_confidence),
        Command::TestConnection => cmd_test_connection().await,
        Command::InitConfig => config::init_config(),
    }
}

/// `LLM_PROVIDER` in the environment overrides the config file wholesale.
fn build_provider(cfg: &config::Config) -> Result<AnyProvider> {
    let provider_config = if std::env::var_os("LLM_PROVIDER").is_some() {
        ProviderConfig::from_env()?
    } else {
        cfg.provider_config()?
    };
    Ok(provider_config.build()?)
}

async fn cmd_categorize(
    input: PathBuf,
    output: Option<PathBuf>,
    store: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let cfg = config::load_config()?;
    let rows = read_csv_rows(&input)?;
    eprintln!("Read {} rows from {}", rows.len(), input.display());

    let provider = build_provider(&cfg)?;
    let categorizer = Categorizer::new(provider, cfg.categories.parent_tags.clone());

    let result = categorizer
        .categorize_all(rows, &cfg.batch_options(), |processed, total| {
            eprintln!("Processed {processed}/{total} rows");
        })
        .await?;

    if result.dropped > 0 {
        eprintln!(
            "Dropped {} rows that failed extraction or validation",
            result.dropped
        );
    }
    if result.estimated_cost > 0.0 {
        eprintln!("Estimated LLM cost: ${:.4}", result.estimated_cost);
    }

    emit_graph(&result.records, output, store, pretty)
}

fn cmd_sync(
    input: PathBuf,
    output: Option<PathBuf>,
    store: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let raw = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
    let transactions: Vec<AggregatorTransaction> =
        serde_json::from_str(&raw).context("parse aggregator transactions")?;

    let records = records_from_aggregator(&transactions);
    eprintln!(
        "Converted {}/{} aggregator transactions",
        records.len(),
        transactions.len()
    );

    emit_graph(&records, output, store, pretty)
}

fn emit_graph(
    records: &[TransactionRecord],
    output: Option<PathBuf>,
    store: Option<PathBuf>,
    pretty: bool,
) -> Result<()> {
    let hierarchy = build_hierarchy(records);
    let links = calculate_links(&hierarchy);

    if let Some(path) = store {
        // Links are derived; only nodes and the map go to storage
        let durable = serde_json::json!({
            "nodes": persist::to_persisted(&hierarchy),
            "map": hierarchy.map,
        });
        fs::write(&path, serde_json::to_string(&durable)?)
            .with_context(|| format!("write {}", path.display()))?;
        eprintln!("Stored {} nodes to {}", hierarchy.nodes.len(), path.display());
    }

    let data = SankeyData {
        nodes: &hierarchy.nodes,
        links: &links,
    };

    let json = if pretty {
        serde_json::to_string_pretty(&data)?
    } else {
        serde_json::to_string(&data)?
    };

    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
            eprintln!(
                "Wrote {} nodes, {} links to {}",
                hierarchy.nodes.len(),
                links.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_recurring(input: PathBuf, min_confidence: f64) -> Result<()> {
    let raw = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
    let records: Vec<TransactionRecord> =
        serde_json::from_str(&raw).context("parse transaction records")?;

    let groups = detect_recurring(&records);
    let shown: Vec<_> = groups
        .iter()
        .filter(|g| g.confidence >= min_confidence)
        .collect();

    if shown.is_empty() {
        println!("No recurring charges detected.");
        return Ok(());
    }

    for group in shown {
        let next = group
            .next_expected_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{}: {} (${:.2} avg, every ~{} days, confidence {:.2})",
            group.name,
            group.frequency.label(),
            group.average_amount,
            group.frequency_days,
            group.confidence,
        );
        println!(
            "    {} occurrences, next expected {}, ~${:.0}/year",
            group.transactions.len(),
            next,
            group.annual_cost(),
        );
    }
    Ok(())
}

async fn cmd_test_connection() -> Result<()> {
    let cfg = config::load_config()?;
    let provider = build_provider(&cfg)?;
    if provider.test_connection().await {
        println!("Provider reachable.");
        Ok(())
    } else {
        anyhow::bail!("provider unreachable or rejected credentials")
    }
}
