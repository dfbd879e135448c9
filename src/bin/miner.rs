use anyhow::{Context, Result};
use clap::Parser;
use consensus_miner::{BlockMiner, MinerConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "miner")]
#[command(about = "Assemble, mine and validate a block from a transaction pool directory")]
struct Cli {
    /// Directory of JSON transaction records
    #[arg(long, default_value = "mempool")]
    mempool: PathBuf,
    /// Where to write the mined block record
    #[arg(long, default_value = "output.txt")]
    output: PathBuf,
    /// JSON configuration file; defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured number of search workers
    #[arg(long)]
    workers: Option<usize>,
    /// Override the configured cap on included transactions
    #[arg(long)]
    max_transactions: Option<usize>,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MinerConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => MinerConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(max) = cli.max_transactions {
        config.max_transactions = max;
    }
    let miner = BlockMiner::new(config).context("invalid configuration")?;

    let candidates = miner
        .load_candidates(&cli.mempool)
        .with_context(|| format!("reading pool {}", cli.mempool.display()))?;
    let template = miner.assemble(candidates).context("assembling block")?;
    info!(
        "template: {} transactions, weight {}, fees {}",
        template.transactions.len(),
        template.total_weight,
        template.total_fees
    );

    let block = miner.mine(&template).context("mining block")?;
    miner
        .validate(&block, &template.transactions)
        .context("validating mined block")?;

    block
        .write_artifact(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!("block {} written to {}", block.display_hash(), cli.output.display());
    Ok(())
}
