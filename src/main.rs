//! Swap Bundler - command line entry point
//!
//! ## Commands
//!
//! - **swap**: one swap, one transaction, one bundle
//! - **batch**: several swaps from a TOML file, combined into one bundle
//! - **status**: inflight status of a submitted bundle
//! - **holdings**: non-dust SPL token balances of the payer

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::sync::Arc;
use std::time::Duration;
use swap_bundler::config::Config;
use swap_bundler::metrics::metrics;
use swap_bundler::quote::JupiterClient;
use swap_bundler::relay::JitoRelayClient;
use swap_bundler::swap_engine::SwapEngine;
use swap_bundler::tx_builder::BundleLookup;
use swap_bundler::types::{SwapBatchFile, SwapRequest};
use swap_bundler::wallet::WalletManager;
use swap_bundler::SwapOutcome;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    print_metrics: bool,

    /// RPC endpoint, overrides the config file
    #[arg(long, env = "RPC_URL", hide_env_values = true)]
    rpc_url: Option<String>,

    /// Base58 secret key, overrides the config file
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Block-engine base URL, overrides the config file
    #[arg(long, env = "JITO_BLOCK_ENGINE_URL")]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a single swap
    Swap {
        /// Input token mint
        #[arg(long)]
        input: Pubkey,

        /// Output token mint
        #[arg(long)]
        output: Pubkey,

        /// Amount in UI units of the input token
        #[arg(long)]
        amount: f64,

        #[arg(long, default_value_t = 50)]
        slippage_bps: u16,
    },

    /// Execute every `[[swap]]` entry of a TOML file as one bundle
    Batch {
        #[arg(long)]
        file: String,
    },

    /// Check the inflight status of a bundle
    Status { bundle_id: String },

    /// List SPL token balances above dust
    Holdings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    info!("🚀 Starting Swap Bundler");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    apply_cli_overrides(&mut config, &args);

    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration: {}", e);
        return Err(e.into());
    }

    let engine = build_engine(&config)?;
    info!("💼 Wallet address: {}", engine.payer());

    let result = run_command(&engine, args.command).await;

    if args.print_metrics {
        println!("{}", metrics().render()?);
    }

    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "swap_bundler=debug,info"
    } else {
        "swap_bundler=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults and environment", path);
        Ok(Config::from_env())
    }
}

fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(url) = &args.rpc_url {
        config.rpc.url = url.clone();
    }
    if let Some(key) = &args.private_key {
        config.wallet.private_key = Some(key.clone());
    }
    if let Some(url) = &args.relay_url {
        config.relay.base_url = url.clone();
    }
}

/// Construct every client once and hand them to the engine
fn build_engine(config: &Config) -> Result<SwapEngine> {
    let secret = config
        .wallet
        .private_key
        .as_deref()
        .context("private key is not set")?;
    let wallet = WalletManager::from_base58_secret(secret).context("Failed to load wallet")?;

    info!("🌐 RPC endpoint: {}", config.rpc.url);
    let rpc = Arc::new(RpcClient::new_with_timeout_and_commitment(
        config.rpc.url.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
        CommitmentConfig::confirmed(),
    ));

    let quotes = Arc::new(JupiterClient::new(
        &config.quote.api_url,
        Duration::from_secs(config.quote.timeout_secs),
    )?);

    let relay = JitoRelayClient::new(
        &config.relay.base_url,
        Duration::from_secs(config.relay.timeout_secs),
        config.relay.auth_uuid.clone(),
    )?;
    info!("📦 Relay endpoint: {}", relay.endpoint());

    Ok(SwapEngine::new(
        rpc,
        quotes,
        Arc::new(relay),
        wallet,
        config.engine_config(),
    ))
}

async fn run_command(engine: &SwapEngine, command: Command) -> Result<()> {
    match command {
        Command::Swap {
            input,
            output,
            amount,
            slippage_bps,
        } => {
            let request = SwapRequest::new(input, output, amount, slippage_bps);
            let outcome = engine.execute_swap(&request).await?;
            report_outcome(&outcome);
        }
        Command::Batch { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read batch file {}", file))?;
            let batch: SwapBatchFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse batch file {}", file))?;
            info!("📥 Loaded {} swap(s) from {}", batch.swaps.len(), file);

            let outcome = engine.execute_batch(&batch.swaps).await?;
            report_outcome(&outcome);
        }
        Command::Status { bundle_id } => match engine.bundle_status(&bundle_id).await {
            BundleLookup::Found(status) => {
                info!(
                    "📊 Bundle {}: {:?} (slot {:?})",
                    status.bundle_id, status.state, status.landed_slot
                );
            }
            BundleLookup::NotFound => {
                info!("🔍 Bundle {} not found by the relay (yet)", bundle_id);
            }
        },
        Command::Holdings => {
            let holdings = engine.holdings().await?;
            info!("💰 {} token holding(s)", holdings.len());
            for holding in holdings {
                println!("{}\t{}", holding.mint, holding.ui_amount);
            }
        }
    }

    Ok(())
}

fn report_outcome(outcome: &SwapOutcome) {
    info!("✅ Swap submitted");
    info!("   Correlation id: {}", outcome.correlation_id);
    info!("   Signature: {}", outcome.signature);
    info!("   Bundle id: {}", outcome.bundle_id);
    info!("   Compute unit limit: {}", outcome.compute_unit_limit);
    match &outcome.status {
        BundleLookup::Found(status) => info!("   Status: {:?}", status.state),
        BundleLookup::NotFound => info!("   Status: not yet visible to the relay"),
    }
    println!("{}\t{}", outcome.signature, outcome.bundle_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_swap_command() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let args = Args::try_parse_from([
            "swap-bundler",
            "--rpc-url",
            "https://rpc.example.com",
            "swap",
            "--input",
            &input.to_string(),
            "--output",
            &output.to_string(),
            "--amount",
            "10",
        ])
        .unwrap();

        match args.command {
            Command::Swap {
                input: i,
                output: o,
                amount,
                slippage_bps,
            } => {
                assert_eq!(i, input);
                assert_eq!(o, output);
                assert_eq!(amount, 10.0);
                assert_eq!(slippage_bps, 50);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "swap-bundler",
            "--rpc-url",
            "https://override.example.com",
            "--relay-url",
            "https://relay.example.com",
            "holdings",
        ])
        .unwrap();

        let mut config = Config::default();
        config.rpc.url = "https://file.example.com".into();
        apply_cli_overrides(&mut config, &args);

        assert_eq!(config.rpc.url, "https://override.example.com");
        assert_eq!(config.relay.base_url, "https://relay.example.com");
    }
}
