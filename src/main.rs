//! candymint - candy machine mint client
//!
//! Thin CLI presentation layer over the mint orchestrator: shows the
//! machine's availability and cost, and drives a single mint attempt
//! against the configured machine.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use candymint::config::Config;
use candymint::ledger::SolanaLedger;
use candymint::orchestrator::{MintOrchestrator, MintState, MintStatus};
use candymint::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "candymint.toml")]
    config: String,

    /// RPC endpoint override
    #[arg(long, env = "CANDYMINT_RPC_URL")]
    rpc_url: Option<String>,

    /// Candy machine address override
    #[arg(long, env = "CANDYMINT_MACHINE_ADDRESS")]
    machine: Option<String>,

    /// Keypair file override
    #[arg(long, env = "CANDYMINT_KEYPAIR")]
    keypair: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show supply counters, cost and mint availability
    Status,
    /// Mint one fresh asset to the configured wallet
    Mint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_config(&args)?;
    let machine_address = match config.machine_address() {
        Ok(address) => address,
        Err(err) => {
            // Configuration errors are shown once and end the session.
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let ledger = Arc::new(SolanaLedger::new(
        config.rpc.endpoint.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
        Duration::from_secs(config.mint.confirm_timeout_secs),
    ));
    let orchestrator = MintOrchestrator::new(ledger, machine_address);

    info!(machine = %machine_address, endpoint = %config.rpc.endpoint, "Starting candymint");

    match args.command {
        Command::Status => {
            // Connect the wallet when available so the funds gate is
            // part of the report; status still works without one.
            match WalletManager::from_file(&config.wallet.keypair_path) {
                Ok(wallet) => {
                    orchestrator.connect_wallet(wallet).await;
                }
                Err(err) => {
                    warn!(error = %err, "No wallet loaded; balance gating skipped");
                    orchestrator.refresh_availability().await;
                }
            }
            print_status(&orchestrator.status().await);
        }
        Command::Mint => {
            let wallet = WalletManager::from_file(&config.wallet.keypair_path)
                .with_context(|| format!("failed to load wallet {}", config.wallet.keypair_path))?;
            let status = orchestrator.connect_wallet(wallet).await;
            if status.mint_disabled {
                print_status(&status);
                anyhow::bail!(
                    "minting is disabled: {}",
                    status.message.unwrap_or_else(|| "unknown reason".to_string())
                );
            }

            let result = orchestrator.activate_mint().await;
            print_status(&result);
            match result.state {
                MintState::Minted => {
                    if let Some(asset) = result.minted_asset {
                        println!("minted asset: {asset}");
                        println!("explorer:     https://solscan.io/token/{asset}");
                    }
                    if let Some(signature) = result.last_signature {
                        println!("signature:    {signature}");
                    }
                }
                _ => {
                    anyhow::bail!(
                        "mint failed: {}",
                        result.message.unwrap_or_else(|| "unknown error".to_string())
                    );
                }
            }
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file_with_env(&args.config)?
    } else {
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(rpc_url) = &args.rpc_url {
        config.rpc.endpoint = rpc_url.clone();
    }
    if let Some(machine) = &args.machine {
        config.machine.address = machine.clone();
    }
    if let Some(keypair) = &args.keypair {
        config.wallet.keypair_path = keypair.clone();
    }
    Ok(config)
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "candymint=debug,info" } else { "candymint=info,warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

fn print_status(status: &MintStatus) {
    println!("state:     {:?}", status.state);
    println!(
        "minted:    {} / {} (remaining {})",
        status.count_minted, status.count_total, status.count_remaining
    );
    println!("cost:      {} SOL", status.cost_sol);
    println!(
        "mint:      {}",
        if status.mint_disabled { "disabled" } else { "available" }
    );
    if let Some(message) = &status.message {
        println!("message:   {message}");
    }
}
