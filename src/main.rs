//! memgov - operator tool for the memory governance core
//!
//! Maintenance commands over an on-disk node store and audit log.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use memgov::{
    audit::AuditFilter,
    config::{GovernanceConfig, StorageConfig},
    memory::NodeId,
    MemoryGovernor, MemoryGovernorBuilder,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memgov")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Authority gate, audit trail and fidelity compression for personal memory")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMGOV_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Advance every node whose window has elapsed
    Sweep,

    /// List stored nodes and their levels
    Nodes,

    /// Print audit records
    Audit {
        /// Only denied judgments
        #[arg(long)]
        denied: bool,

        /// Only records for this node
        #[arg(long)]
        node: Option<String>,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Verify the audit log hash chain
    Verify,

    /// Reconstruct a node at its current level
    Reconstruct {
        /// Node ID
        node: String,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("memgov={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        GovernanceConfig::load(&config_path)?
    } else {
        GovernanceConfig::default()
    };

    match cli.command {
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::Sweep => {
            let governor = open(config).await?;
            run_sweep(&governor).await?;
        }
        Commands::Nodes => {
            let governor = open(config).await?;
            list_nodes(&governor).await?;
        }
        Commands::Audit {
            denied,
            node,
            limit,
        } => {
            let governor = open(config).await?;
            show_audit(&governor, denied, node, limit).await?;
        }
        Commands::Verify => {
            let governor = open(config).await?;
            verify_audit(&governor).await?;
        }
        Commands::Reconstruct { node, json } => {
            let governor = open(config).await?;
            reconstruct(&governor, &node, json).await?;
        }
    }

    Ok(())
}

/// Open the governor against on-disk state, defaulting to ~/.memgov
async fn open(mut config: GovernanceConfig) -> Result<MemoryGovernor> {
    let base = StorageConfig::default_dir();
    if config.audit.log_path.is_none() {
        config.audit.log_path = Some(base.join("audit.jsonl"));
    }
    if config.storage.nodes_dir.is_none() {
        config.storage.nodes_dir = Some(base.join("nodes"));
    }

    let governor = MemoryGovernorBuilder::new().config(config).build().await?;
    governor.load_nodes().await?;
    Ok(governor)
}

async fn run_sweep(governor: &MemoryGovernor) -> Result<()> {
    let report = governor.sweep(Utc::now()).await;
    for (id, level) in &report.advanced {
        println!("  ✓ {} -> {}", id, level);
    }
    for (id, err) in &report.failed {
        println!("  ✗ {}: {}", id, err);
    }
    println!(
        "{} advanced, {} unchanged, {} failed",
        report.advanced.len(),
        report.unchanged,
        report.failed.len()
    );
    Ok(())
}

async fn list_nodes(governor: &MemoryGovernor) -> Result<()> {
    let mut nodes = governor.registry().snapshots().await;
    nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    for node in nodes {
        println!(
            "{:<40} {:<10} sigils={} due={}",
            node.node_id,
            node.compression_level,
            node.sigils.len(),
            governor.compression().window_deadline(&node).to_rfc3339()
        );
    }
    Ok(())
}

async fn show_audit(
    governor: &MemoryGovernor,
    denied: bool,
    node: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let mut filter = AuditFilter::new();
    if denied {
        filter = filter.denied_only();
    }
    if let Some(node) = node {
        filter = filter.node(node);
    }
    if let Some(limit) = limit {
        filter = filter.limit(limit);
    }

    for record in governor.query_audit(&filter).await? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

async fn verify_audit(governor: &MemoryGovernor) -> Result<()> {
    let result = governor.verify_audit().await?;
    if result.valid {
        println!("  ✓ Audit chain intact ({} entries)", result.total_entries);
    } else {
        println!(
            "  ✗ Audit chain broken at entry {} of {}",
            result.first_invalid_index.unwrap_or_default(),
            result.total_entries
        );
        std::process::exit(1);
    }
    Ok(())
}

async fn reconstruct(governor: &MemoryGovernor, node: &str, json: bool) -> Result<()> {
    let view = governor.reconstruct(&NodeId::new(node)).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{} ({})", view.node_id, view.fidelity.description());
        println!("{}", view.render());
    }
    Ok(())
}

fn show_config(config: Option<&GovernanceConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
