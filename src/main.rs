use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use trendrotor::api::KrakenClient;
use trendrotor::config::{BotConfig, DEFAULT_CONFIG_PATH};
use trendrotor::engine::RebalanceLoop;

/// Trend-following portfolio rotation for a Kraken spot account
#[derive(Parser, Debug)]
#[command(name = "trendrotor", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Validate orders with the exchange without placing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => {
            tracing::info!("👋 trendrotor stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ trendrotor terminated: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendrotor=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = BotConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    if args.dry_run {
        config.dry_run = true;
    }

    let api_key =
        std::env::var("KRAKEN_API_KEY").context("KRAKEN_API_KEY not found in environment")?;
    let api_secret =
        std::env::var("KRAKEN_API_SECRET").context("KRAKEN_API_SECRET not found in environment")?;

    let client = KrakenClient::with_credentials(api_key, api_secret)
        .context("Failed to build HTTP client")?
        .with_base_url(config.api_url.clone())
        .with_validate_only(config.dry_run);

    log_configuration(&config);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                cancel.cancel();
            }
        });
    }

    let bot = RebalanceLoop::new(client, &config, cancel);

    if args.once {
        let report = bot.run_cycle().await.context("Cycle failed")?;
        tracing::info!(
            "Single cycle {} complete ({} pairs evaluated, {} skipped)",
            report.cycle_id,
            report.evaluated,
            report.skipped.len()
        );
        return Ok(());
    }

    tracing::info!("Press Ctrl+C to stop...");
    bot.run().await.context("Rebalance loop stopped")?;
    Ok(())
}

fn log_configuration(config: &BotConfig) {
    tracing::info!("🚀 trendrotor starting");
    tracing::info!("📊 Configuration:");
    tracing::info!("  Exchange: {}", config.api_url);
    tracing::info!("  Quote asset: {}", config.quote_asset);
    tracing::info!("  Pairs: {}", config.pairs.len());
    tracing::info!(
        "  Trend windows: {}/{} bars of {} min",
        config.signal.short_window,
        config.signal.long_window,
        config.ohlc_interval_minutes
    );
    tracing::info!(
        "  Margins: sell {:.1}%, buy {:.1}%",
        config.signal.sell_margin * 100.0,
        config.signal.buy_margin * 100.0
    );
    tracing::info!(
        "  Allocation: {} slots, {:.0}% deployed",
        config.allocation.slots,
        config.allocation.fee_buffer * 100.0
    );
    tracing::info!(
        "  Timing: cycle every {}s, settlement wait {}s",
        config.cycle_interval_secs,
        config.settlement_delay_secs
    );
    if config.dry_run {
        tracing::warn!("  DRY RUN: orders are validated, never placed");
    }
}
