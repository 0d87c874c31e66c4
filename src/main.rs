//! Dividend-Capture Robot
//!
//! Buys configured shares ahead of their dividend cutoff, holds them through
//! it and sells once the cutoff has passed.

mod api;
mod bot;
mod market;
mod models;
mod trading;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bot::{connect_market, Bot, BotConfig};
use crate::market::MarketService;
use crate::trading::{classify, parse_target, InstrumentState};

/// Dividend-capture trading robot CLI.
#[derive(Parser)]
#[command(name = "divbot")]
#[command(about = "Capture dividends on Moscow Exchange shares via Tinkoff Invest", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON configuration file
    #[arg(short, long, env = "DIVBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Target holding as FIGI=LOTS (repeatable, overrides the config file)
    #[arg(short, long = "target", value_parser = parse_target, global = true)]
    targets: Vec<(String, u32)>,

    /// Use the Tinkoff sandbox instead of the live gateway
    #[arg(long, global = true)]
    sandbox: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the robot: one cycle per interval until Ctrl+C
    Run {
        /// Polling interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Dry run (don't place or cancel orders)
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single cycle and print its report
    Once {
        /// Dry run (don't place or cancel orders)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the account portfolio
    Portfolio,

    /// Show the dividend calendar and current state of one instrument
    Dividends {
        /// Instrument FIGI
        figi: String,
    },

    /// Show current configuration
    Config,
}

fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = match &cli.config {
        Some(path) => BotConfig::load(path)?,
        None => BotConfig::default(),
    };

    for (figi, lots) in &cli.targets {
        config.engine.targets.insert(figi.clone(), *lots);
    }
    if cli.sandbox {
        config.sandbox = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run { interval, dry_run } => {
            if let Some(secs) = interval {
                config.poll_interval_secs = secs;
            }
            config.dry_run |= dry_run;
            config.validate()?;

            info!(
                interval = config.poll_interval_secs,
                dry_run = config.dry_run,
                sandbox = config.sandbox,
                "Starting dividend robot"
            );

            if config.engine.targets.is_empty() && config.engine.default_target_lots == 0 {
                println!("No targets configured: the robot will only sell after cutoffs.");
                println!("Use --target FIGI=LOTS or a config file to add targets.\n");
            }

            let mut bot = Bot::connect(config.clone()).await?;

            println!("\n=== Dividend Robot ===");
            println!("Polling interval: {}s", config.poll_interval_secs);
            println!("Gateway: {}", if config.sandbox { "SANDBOX" } else { "PRODUCTION" });
            println!("Mode: {}", if config.dry_run { "DRY RUN (no real orders)" } else { "LIVE TRADING" });
            println!("Targets: {}", config.engine.targets.len());
            println!("\nPress Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }
        }

        Commands::Once { dry_run } => {
            config.dry_run |= dry_run;

            let mut bot = Bot::connect(config).await?;
            let report = bot.tick().await.context("Cycle failed")?;
            println!("\n{}", report);
        }

        Commands::Portfolio => {
            // Reads only
            config.dry_run = true;
            let market = connect_market(&config).await?;
            let portfolio = market.get_portfolio().await.context("Failed to fetch portfolio")?;

            println!(
                "\n{:<14} {:<10} {:>8} {:>10} {:>12} {:>12} {:>12}",
                "FIGI", "TYPE", "LOTS", "QTY", "AVG", "PRICE", "P&L"
            );
            println!("{}", "-".repeat(84));

            for pos in &portfolio.positions {
                println!(
                    "{:<14} {:<10} {:>8} {:>10} {:>12.2} {:>12.2} {:>12.2}",
                    pos.figi,
                    truncate(&pos.instrument_type, 10),
                    pos.held_lots(),
                    pos.quantity.normalize(),
                    pos.average_price,
                    pos.current_price,
                    pos.unrealized_pnl()
                );
            }

            let market_value: Decimal = portfolio
                .positions
                .iter()
                .filter(|p| p.is_share())
                .map(|p| p.market_value())
                .sum();

            println!("\nShares (reported): {:.2}", portfolio.total_shares_value);
            println!("Shares (priced):   {:.2}", market_value);
            println!("Cash:              {:.2}", portfolio.total_cash);
            println!("Total:             {:.2}", portfolio.total_value());
        }

        Commands::Dividends { figi } => {
            config.dry_run = true;
            let market = connect_market(&config).await?;
            let engine = &config.engine;
            let now = market.now();

            let instrument = market
                .get_instrument(&figi)
                .await
                .with_context(|| format!("Failed to fetch instrument {}", figi))?;
            let dividends = market
                .get_dividends(&figi, now - engine.dividend_history(), now + engine.lookahead())
                .await
                .context("Failed to fetch dividends")?;
            let price = market.get_last_price(&figi).await?.map(|p| p.price);
            let held = market.get_portfolio().await?.held_lots(&figi);

            println!("\n=== {} ({}) ===", instrument.display_name(), instrument.figi);
            println!("Lot size:    {}", instrument.lot_size());
            match price {
                Some(p) => println!("Last price:  {:.2} {}", p, instrument.currency),
                None => println!("Last price:  n/a"),
            }

            println!("\n{:<12} {:<12} {:>10} {:>8}", "CUTOFF", "PAYMENT", "NET", "YIELD");
            println!("{}", "-".repeat(45));
            for d in &dividends {
                let yield_pct = match price {
                    Some(p) if !p.is_zero() => format!("{:.2}%", d.dividend_net / p * dec!(100)),
                    _ => "-".to_string(),
                };
                println!(
                    "{:<12} {:<12} {:>10.2} {:>8}",
                    d.last_buy_date.format("%Y-%m-%d"),
                    d.payment_date
                        .map(|p| p.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    d.dividend_net,
                    yield_pct
                );
            }

            let target = engine.target_for(&figi);
            let state = classify(&dividends, held, target, now, engine.lookahead());
            println!("\nHeld: {} lots, target: {} lots", held, target);
            println!(
                "State: {}",
                match state {
                    InstrumentState::NoAction => "no action".to_string(),
                    InstrumentState::Accumulating { lots_to_buy } =>
                        format!("accumulating (buy {} lots)", lots_to_buy),
                    InstrumentState::HoldingForPayout => "holding for payout".to_string(),
                    InstrumentState::Liquidating { lots } => format!("liquidating (sell {} lots)", lots),
                }
            );
        }

        Commands::Config => {
            let engine = &config.engine;
            let session = &config.session;

            println!("\n=== Robot Configuration ===\n");
            println!("Scheduling:");
            println!("  Poll Interval:        {}s", config.poll_interval_secs);
            println!("  Dry Run:              {}", config.dry_run);
            println!("  Sandbox:              {}", config.sandbox);

            println!("\nDividend Window:");
            println!("  Lookahead:            {} days", engine.lookahead_days);
            println!("  History:              {} days", engine.dividend_history_days);

            println!("\nRisk:");
            println!("  Cash Reserve Floor:   {}", engine.cash_reserve_floor);
            println!("  Call Timeout:         {}ms", engine.call_timeout_ms);
            println!("  Stale Order After:    {}s", engine.stale_order_after_secs);

            println!("\nSession (UTC{:+}):", session.utc_offset_hours);
            println!("  Open:                 {}", session.open.format("%H:%M"));
            println!("  Close:                {}", session.close.format("%H:%M"));
            println!("  Weekends:             {}", session.weekends);

            println!("\nTargets (default {} lots):", engine.default_target_lots);
            if engine.targets.is_empty() {
                println!("  (none)");
            }
            for (figi, lots) in &engine.targets {
                println!("  {:<14} {:>6} lots", figi, lots);
            }

            println!("\nAs JSON:\n{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
