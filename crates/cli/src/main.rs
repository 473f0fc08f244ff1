//! Command line entry point for the CLMM rebalancer.
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clmm_rebalancer_data::prelude::*;
use clmm_rebalancer_domain::enums::SkimAsset;
use clmm_rebalancer_execution::prelude::*;
use clmm_rebalancer_protocols::prelude::*;
use commands::{OperatorCommand, dispatch, render_rebalance};
use config::AppConfig;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clmm-rebalancer")]
#[command(about = "Automated concentrated-liquidity rebalancer with profit skimming", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling loop; operator commands are read from stdin
    Run,
    /// Show active positions, recent rebalances and the skim wallet
    Status,
    /// Fetch the current price of every configured pool once
    CheckPrices,
    /// Confirm that the skim wallet balance of one asset was deposited
    Deposited {
        /// Asset that was moved out of the skim wallet
        #[arg(long)]
        asset: SkimAsset,
    },
    /// Rebalance a pool around the current price now
    Rebalance {
        /// Pool name or address
        pool: String,
    },
    /// Close a pool's position and collect its fees
    Close {
        /// Pool name or address
        pool: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let store = Arc::new(open_store(&config.database_url).await?);

    let result = match &cli.command {
        Commands::Status => print_status(&config, store.as_ref()).await,
        command => match build_orchestrator(&config, store.clone()) {
            Ok(orchestrator) => execute(command, Arc::new(orchestrator)).await,
            Err(e) => Err(e),
        },
    };

    store.close().await;
    result
}

async fn execute(command: &Commands, orchestrator: Arc<Orchestrator>) -> Result<()> {
    match command {
        Commands::Run => run(orchestrator).await,
        Commands::CheckPrices => {
            let snapshots = orchestrator
                .monitor()
                .fetch_prices_for_pools(orchestrator.pools())
                .await;
            for pool in orchestrator.pools() {
                match snapshots.get(&pool.address) {
                    Some(s) => println!(
                        "{:<16} {:>14} via {:<6} in range: {} (to lower {:.4}, to upper {:.4})",
                        pool.name,
                        s.price,
                        s.source,
                        s.in_range,
                        s.distance_to_lower,
                        s.distance_to_upper
                    ),
                    None => println!("{:<16} unavailable", pool.name),
                }
            }
            Ok(())
        }
        Commands::Deposited { asset } => {
            let amount = orchestrator.skim().record_deposit(*asset).await?;
            println!("Recorded deposit of {amount} {asset}");
            Ok(())
        }
        Commands::Rebalance { pool } => {
            orchestrator.seed_from_store().await;
            let result = orchestrator.manual_rebalance(pool).await?;
            println!("{}", render_rebalance(&result));
            if result.is_success() {
                Ok(())
            } else {
                anyhow::bail!("rebalance of {pool} did not complete")
            }
        }
        Commands::Close { pool } => {
            let outcome = orchestrator.emergency_close(pool).await?;
            println!(
                "Closed {pool}: fees ${:.2}, gas {} base units, tx {}",
                outcome.fees.usd, outcome.gas_used, outcome.tx_digest
            );
            Ok(())
        }
        Commands::Status => Ok(()),
    }
}

/// Runs the loop until ctrl-c, serving operator commands from stdin.
async fn run(orchestrator: Arc<Orchestrator>) -> Result<()> {
    let runner = Arc::clone(&orchestrator);
    let mut engine = tokio::spawn(async move { runner.start().await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                orchestrator.stop();
                break;
            }
            joined = &mut engine => {
                joined.context("orchestrator task panicked")?;
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<OperatorCommand>() {
                    Ok(command) => {
                        info!(command = %command, "Operator command");
                        println!("{}", dispatch(&orchestrator, &command).await);
                    }
                    Err(e) => println!("{e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    engine.await.context("orchestrator task panicked")?;
    Ok(())
}

async fn print_status(config: &AppConfig, store: &Database) -> Result<()> {
    for pool in &config.pools {
        match store.active_position(&pool.address).await? {
            Some(p) => println!(
                "{:<16} position {} [{}, {}] entry {} since {}",
                pool.name, p.position_id, p.range.lower, p.range.upper, p.entry_price, p.opened_at
            ),
            None => println!("{:<16} no active position", pool.name),
        }
        for r in store.recent_rebalances(&pool.address, 3).await? {
            println!(
                "  {} {} at {} fees ${:.2} skim {} USDC / {} native",
                r.executed_at,
                r.trigger_reason,
                r.trigger_price,
                r.fees.usd,
                r.skim.usdc_equivalent,
                r.skim.native_equivalent
            );
        }
    }

    let wallet = store
        .skim_wallet_status(&config.global.skim.thresholds)
        .await?;
    println!(
        "Skim wallet: {} / {} USDC, {} / {} native, ready for deposit: {}",
        wallet.usdc_balance,
        wallet.usdc_threshold,
        wallet.native_balance,
        wallet.native_threshold,
        wallet.ready_for_deposit
    );
    Ok(())
}

async fn open_store(database_url: &str) -> Result<Database> {
    if let Some(file_path) = database_url.strip_prefix("sqlite://")
        && let Some(parent) = Path::new(file_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Database::connect(database_url)
        .await
        .with_context(|| format!("opening database {database_url}"))
}

fn build_orchestrator(config: &AppConfig, store: Arc<Database>) -> Result<Orchestrator> {
    if config.wallet_address.is_empty() {
        anyhow::bail!("WALLET_ADDRESS must be set to the address the bridge signs for");
    }
    let bridge = Arc::new(BridgeClient::new(&config.bridge_url, &config.wallet_address));

    let oracle: Option<Arc<dyn OracleClient>> = if config.pyth_feeds.is_empty() {
        None
    } else {
        let mut hermes = HermesClient::new();
        if let Some(url) = &config.hermes_url {
            hermes = hermes.with_base_url(url);
        }
        for (pair, feed_id) in &config.pyth_feeds {
            hermes = hermes.with_feed(pair, feed_id);
        }
        Some(Arc::new(hermes))
    };

    let mut notifier = MultiNotifier::new().with(Arc::new(LogNotifier));
    if let Some(telegram) = &config.telegram {
        notifier = notifier.with(Arc::new(TelegramNotifier::new(
            &telegram.bot_token,
            &telegram.chat_id,
        )));
    }

    Ok(Orchestrator::new(
        config.pools.clone(),
        config.global.clone(),
        Boundaries {
            amm: bridge.clone(),
            chain: bridge,
            oracle,
            store,
            notifier: Arc::new(notifier),
        },
    ))
}
