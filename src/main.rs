//! flow-ledger: derived flow ledger and on-chain reconciliation
//!
//! - `verify`: compare the indexed ledger of a network against chain state
//! - `replay`: rebuild a ledger from a JSON-lines event stream and check
//!   its conservation invariants

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use flow_ledger::chain::RpcSource;
use flow_ledger::config::Config;
use flow_ledger::indexer::GraphQlClient;
use flow_ledger::ledger::{invariants, LedgerEngine, SequencedEvent, SqliteStore, TracingAudit};
use flow_ledger::verify::Verifier;

#[derive(Parser)]
#[command(name = "flow-ledger")]
#[command(about = "Derived flow ledger and on-chain reconciliation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "FLOW_LEDGER_CONFIG", default_value = "flow-ledger.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the indexed ledger of a network against the chain
    Verify {
        /// Network identifier from the config file
        #[arg(long)]
        network: String,

        /// Block to verify at (defaults to the latest indexed block)
        #[arg(long)]
        block: Option<u64>,

        /// Rows per indexed-store page (overrides config file)
        #[arg(long)]
        page_size: Option<usize>,

        /// Concurrent authoritative reads (overrides config file)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Fail on any record mismatch or failed check
        #[arg(long)]
        strict: bool,
    },

    /// Apply a JSON-lines event file to a ledger and check its invariants
    Replay {
        /// Event file, one event per line
        #[arg(long)]
        events: PathBuf,

        /// SQLite ledger database (overrides config file)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("flow_ledger={}", cli.log_level).into()),
        )
        .init();

    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Command::Verify {
            network,
            block,
            page_size,
            chunk_size,
            strict,
        } => {
            if let Some(page_size) = page_size {
                config.verify.page_size = page_size;
            }
            if let Some(chunk_size) = chunk_size {
                config.verify.chunk_size = chunk_size;
            }
            config.verify.fail_on_mismatch |= strict;
            config.validate()?;
            verify(&config, &network, block).await
        }
        Command::Replay { events, database } => {
            if database.is_some() {
                config.ledger.database = database;
            }
            replay(&config, &events)
        }
    }
}

async fn verify(config: &Config, network_id: &str, block: Option<u64>) -> anyhow::Result<()> {
    let network = config.network(network_id)?;
    info!(
        network = %network.name,
        endpoint = %network.indexed_store_endpoint,
        "Executing data integrity verification"
    );

    let settings = config.verify.clone();
    let indexed = GraphQlClient::new(&network.indexed_store_endpoint, settings.call_timeout_secs)?;
    let chain = RpcSource::new(&network.rpc_url, network.cfa, network.ida, settings.call_timeout_secs)?;
    let strict = settings.fail_on_mismatch;

    let report = Verifier::new(indexed, chain, settings).run(block).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    report.verdict(strict)?;
    Ok(())
}

fn replay(config: &Config, events: &Path) -> anyhow::Result<()> {
    let store = match &config.ledger.database {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::in_memory()?,
    };
    let mut engine = LedgerEngine::new(store, TracingAudit)?;
    let resume_after = engine.checkpoint().map(|cp| cp.position);

    let file = File::open(events).with_context(|| format!("cannot open {}", events.display()))?;
    let (mut applied, mut skipped) = (0u64, 0u64);
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: SequencedEvent = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid event", events.display(), n + 1))?;
        if resume_after.is_some_and(|last| event.meta.position() <= last) {
            skipped += 1;
            continue;
        }
        engine
            .apply(&event)
            .with_context(|| format!("{}:{}: {} rejected", events.display(), n + 1, event.event.name()))?;
        applied += 1;
    }
    info!(applied, skipped, "Replay finished");

    let violations = invariants::check(engine.store())?;
    if !violations.is_empty() {
        for v in &violations {
            warn!("{}", v);
        }
        anyhow::bail!("{} ledger invariant violations", violations.len());
    }
    Ok(())
}
