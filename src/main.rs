use anyhow::{bail, Context, Result};
use clap::Parser;
use cryptopepe_chain::tx::{Coinbase, PepeTransaction, SchTransaction};
use cryptopepe_chain::validity::{check, meets_target};
use cryptopepe_chain::{Block, ChainConfig, ChainStore};
use rand::Rng;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

// -----------------------------
// CLI
// -----------------------------

/// Single-process PoW node: mines blocks and appends them to the chain directory.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file (toml, json or yaml).
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured storage directory.
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Number of blocks to mine after genesis.
    #[clap(short, long, default_value_t = 3)]
    blocks: u32,

    /// Overrides the proof-of-work prefix length for every block.
    #[clap(long)]
    difficulty: Option<usize>,

    /// Address receiving the block rewards.
    #[clap(long, default_value = "miner_1")]
    miner: String,
}

// -----------------------------
// Mining / PoW
// -----------------------------

fn mine(block: &mut Block, prefix_len: usize) -> Result<()> {
    let start: u32 = rand::thread_rng().gen();
    for offset in 0..=u32::MAX {
        block.set_nonce(start.wrapping_add(offset))?;
        if meets_target(&block.header.hash, prefix_len) {
            return Ok(());
        }
    }
    bail!("nonce space exhausted for block {}", block.id())
}

fn random_transactions(block: &mut Block) -> Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..3 {
        block.add_sch_transaction(SchTransaction {
            from: format!("addr_{}", rng.gen::<u16>()),
            to: format!("addr_{}", rng.gen::<u16>()),
            amount: rng.gen_range(1..1000),
        })?;
    }
    block.add_pepe_transaction(PepeTransaction { hash: rng.gen() })?;
    Ok(())
}

fn seal(store: &ChainStore, config: &ChainConfig, mut block: Block) -> Result<Block> {
    let target = config.target_for(block.id());
    mine(&mut block, target)?;
    check(&block, config).with_context(|| format!("mined block {} is invalid", block.id()))?;
    store.save(&mut block)?;
    info!(
        id = block.id(),
        nonce = block.header.nonce,
        txs = block.data.sch_transactions.len() + block.data.pepe_transactions.len(),
        hash = %block.header.hash,
        "block appended"
    );
    Ok(block)
}

// -----------------------------
// Application
// -----------------------------

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = ChainConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.data_dir {
        config.storage_root_dir = dir;
    }
    if let Some(difficulty) = cli.difficulty {
        config.target_prefix_length = difficulty;
        config.genesis_target_prefix_length = difficulty;
    }
    config.validate()?;

    let store = ChainStore::from_config(&config)?;

    let mut parent: Block = match store.latest()? {
        Some(block) => {
            info!(id = block.id(), "resuming chain");
            block
        }
        None => {
            info!("no chain found, mining genesis");
            seal(&store, &config, Block::genesis(&config)?)?
        }
    };

    for _ in 0..cli.blocks {
        let mut block = parent.next(parent.header.bits)?;
        block.set_reward(SchTransaction::coinbase(&cli.miner))?;
        random_transactions(&mut block)?;
        parent = seal(&store, &config, block)?;
    }

    Ok(())
}
