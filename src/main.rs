//! kernel-inspect
//!
//! Builds a synthetic single-staker chain under the given chain parameters
//! and prints the stake modifier state of every block.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use divi_kernel::chain::{ChainParams, ChainView};
use divi_kernel::consensus::selection_interval;
use divi_kernel::crypto::PrivateKey;
use divi_kernel::node::Simnet;

/// Inspect stake modifiers on a synthetic chain
#[derive(Parser, Debug)]
#[command(name = "kernel-inspect")]
#[command(about, long_about = None)]
struct Args {
    /// `mainnet`, `testnet`, `regtest` or a path to a JSON parameter file
    #[arg(default_value = "regtest")]
    params: String,

    /// Proof-of-work blocks mined before staking starts
    #[arg(long, default_value_t = 20)]
    work: u32,

    /// Blocks produced after the work phase
    #[arg(long, default_value_t = 100)]
    blocks: u32,

    /// Hex-encoded 32-byte staking key
    #[arg(long)]
    key: Option<String>,
}

fn load_params(name: &str) -> Result<ChainParams> {
    Ok(match name {
        "mainnet" => ChainParams::mainnet(),
        "testnet" => ChainParams::testnet(),
        "regtest" => ChainParams::regtest(),
        path => ChainParams::from_json_file(PathBuf::from(path))
            .with_context(|| format!("loading chain parameters from {path}"))?,
    })
}

fn load_key(key: Option<&str>) -> Result<PrivateKey> {
    let Some(key) = key else {
        return Ok(PrivateKey::generate());
    };
    let bytes: [u8; 32] = hex::decode(key)
        .context("staking key is not hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("staking key must be 32 bytes"))?;
    Ok(PrivateKey::from_bytes(&bytes)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let params = load_params(&args.params)?;
    let key = load_key(args.key.as_deref())?;

    info!(
        network = ?params.network,
        modifier_interval = params.modifier_interval,
        selection_interval = selection_interval(params.modifier_interval),
        witness_height = params.witness_activation_height,
        "Building synthetic chain"
    );

    let net = Simnet::build(params, key, args.work, args.blocks)?;
    let chain = net.chain().snapshot();
    let witness_height = chain.params().witness_activation_height;

    println!("{:>6}  {:>10}  {:<4}  {:<18}  {:<3}  {:<10}  modifier v3", "height", "time", "kind", "modifier", "gen", "checksum");
    for height in 0..=net.tip().height {
        let Some(block) = chain.block_at_height(height) else {
            break;
        };
        let kind = if block.is_proof_of_stake { "pos" } else { "pow" };
        let v3 = if height >= witness_height {
            block.stake_modifier_v3.to_hex()
        } else {
            String::from("-")
        };
        println!(
            "{:>6}  {:>10}  {:<4}  {:#018x}  {:<3}  {:#010x}  {}",
            block.height,
            block.timestamp,
            kind,
            block.stake_modifier_v2,
            if block.generated_modifier { "yes" } else { "no" },
            block.stake_modifier_checksum,
            v3
        );
    }
    Ok(())
}
