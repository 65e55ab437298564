//! Zone Trader - Main Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use zone_trader::bot::TradingBot;
use zone_trader::config::Config;
use zone_trader::exchange::{CoinbaseClient, FalconxClient, PerVenue, VenueClient};
use zone_trader::history::HistoryStore;

/// Zone Trader CLI
#[derive(Parser)]
#[command(name = "zone-trader")]
#[command(version, about = "Threshold-zone trading across Coinbase and FalconX")]
struct Cli {
    /// Place real orders and loop on the configured schedule.
    /// Without this flag the bot runs one dry-run tick and exits.
    #[arg(long)]
    live: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the persisted trade history summary
    Status {
        /// Path to the history database
        #[arg(short, long, default_value = "data/history.db")]
        db: String,

        /// Number of recent rows to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    if let Some(Commands::Status { db, limit }) = cli.command {
        return show_status(&db, limit);
    }

    let mut config = Config::load()?;
    if cli.live {
        config.trading.live = true;
    }
    config.validate()?;
    log_config(&config);

    let live = config.trading.live;
    if live {
        warn!("LIVE TRADING MODE - real orders will be placed");
    } else {
        info!("dry-run mode - orders are logged, never sent");
    }

    if let Some(parent) = std::path::Path::new(&config.history.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let coinbase = CoinbaseClient::new(&config.coinbase, live)?;
    let falconx = FalconxClient::new(&config.falconx, live)?;
    let venues: PerVenue<Arc<dyn VenueClient>> =
        PerVenue::new(Arc::new(coinbase), Arc::new(falconx));

    let store = HistoryStore::new(&config.history.db_path)?;
    let tick_interval_secs = config.trading.tick_interval_secs;
    let bot = TradingBot::new(config, venues, store)?;

    if !live {
        // one decision per invocation; scheduling is external
        bot.run_tick().await?;
        return Ok(());
    }

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!(interval_secs = tick_interval_secs, "starting trading loop");
    let mut interval = tokio::time::interval(Duration::from_secs(tick_interval_secs));

    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // A failed tick persists nothing; the next one retries from the
        // last-known-good table.
        if let Err(e) = bot.run_tick().await {
            error!(error = %format!("{e:#}"), "tick failed, will retry on next schedule");
        }
    }

    info!("trading loop stopped");
    Ok(())
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "zone-trader.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the flush guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("zone_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("configuration:");
    info!("   pair:       {}", config.trading.asset_pair);
    info!("   bet size:   {}", config.trading.bet_size);
    info!("   threshold:  {}", config.trading.threshold);
    info!(
        "   indicator:  {:?} (period {}, factor {})",
        config.indicator.kind, config.indicator.period, config.indicator.factor
    );
    info!(
        "   fees:       coinbase {} / falconx {}",
        config.coinbase.fee_estimate, config.falconx.fee_estimate
    );
    info!("   candles:    {}", config.feed.candles_path);
    info!("   history:    {}", config.history.db_path);
}

fn show_status(db_path: &str, limit: usize) -> Result<()> {
    if !std::path::Path::new(db_path).exists() {
        println!("Database not found: {db_path}");
        println!("The bot has not run yet, or the database path is incorrect.");
        return Ok(());
    }

    let store = HistoryStore::new(db_path)?;
    let history = store.load()?;

    let Some(last) = history.last() else {
        println!("No trade history recorded yet.");
        return Ok(());
    };

    let sells = history
        .records()
        .iter()
        .filter(|r| r.net_profit.is_some())
        .count();
    let wins = history
        .records()
        .iter()
        .filter(|r| r.outcome_including_fees == Some(zone_trader::history::Outcome::Win))
        .count();

    println!("Trade History Summary");
    println!("   ├─ Rows:                {}", history.len());
    println!("   ├─ Closed positions:    {sells} ({wins} wins)");
    println!("   ├─ Capital risked:      {}", last.running_capital_risked);
    println!("   ├─ Running net profit:  {}", last.running_net_profit);
    println!("   ├─ Running RAROI:       {}", last.running_raroi);
    println!(
        "   └─ Last tick:           {} ({})",
        last.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        last.state
    );

    println!("\nRecent rows");
    let start = history.len().saturating_sub(limit);
    for record in &history.records()[start..] {
        let venue = record
            .venue
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let profit = record
            .net_profit
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {}  {:>9}  {:>8}  indicator {}  net {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.state.to_string(),
            venue,
            record.indicator,
            profit
        );
    }

    Ok(())
}
