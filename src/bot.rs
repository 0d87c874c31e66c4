//! Bot runner: connects to the brokerage and runs one engine cycle per poll
//! interval until shut down.
//!
//! Handles:
//! - Building the market service (live, sandbox or dry-run)
//! - Scheduling cycles and surviving failed ones
//! - Aggregating statistics across cycles

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::TinkoffClient;
use crate::market::{DryRunMarket, MarketService, SessionConfig};
use crate::trading::{CycleError, CycleMode, CycleReport, DividendEngine, EngineConfig};

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Seconds between cycles
    pub poll_interval_secs: u64,

    /// Read from the brokerage but never place or cancel orders
    pub dry_run: bool,

    /// Use the brokerage sandbox instead of the live gateway
    pub sandbox: bool,

    /// Decision engine configuration
    pub engine: EngineConfig,

    /// Exchange session window
    pub session: SessionConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            dry_run: false,
            sandbox: false,
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        self.engine.validate()
    }
}

/// Build the brokerage connection described by `config`.
pub async fn connect_market(config: &BotConfig) -> Result<Arc<dyn MarketService>> {
    let mut client = TinkoffClient::from_env(config.sandbox, config.session.clone())?;
    client.ensure_account().await?;

    info!(
        account_id = %client.account_id(),
        sandbox = config.sandbox,
        dry_run = config.dry_run,
        "Brokerage client initialized"
    );

    let market: Arc<dyn MarketService> = if config.dry_run {
        Arc::new(DryRunMarket::new(client))
    } else {
        Arc::new(client)
    };
    Ok(market)
}

/// Main bot runner.
pub struct Bot {
    config: BotConfig,
    engine: DividendEngine,
    stats: BotStats,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    pub fn new(config: BotConfig, market: Arc<dyn MarketService>) -> Self {
        let engine = DividendEngine::new(market, config.engine.clone());
        let stats = BotStats {
            dry_run: config.dry_run,
            ..Default::default()
        };

        Self {
            config,
            engine,
            stats,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connect to the brokerage and create a bot.
    pub async fn connect(config: BotConfig) -> Result<Self> {
        config.validate()?;
        let market = connect_market(&config).await?;
        Ok(Self::new(config, market))
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            dry_run = self.config.dry_run,
            poll_interval = self.config.poll_interval_secs,
            targets = self.config.engine.targets.len(),
            "Starting bot run loop"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_secs));

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            poll_interval.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            // A failed cycle is logged; the next tick starts from scratch
            let _ = self.tick().await;
        }

        info!("Bot shutdown complete");
        println!("{}", self.stats);
        Ok(())
    }

    /// Run a single cycle and fold its outcome into the statistics.
    pub async fn tick(&mut self) -> Result<CycleReport, CycleError> {
        debug!("Bot tick");
        self.stats.cycles += 1;

        match self.engine.run_cycle().await {
            Ok(report) => {
                self.stats.record(&report);
                if report.planned.is_empty() && report.issues.is_empty() {
                    debug!("Nothing to do this cycle");
                } else {
                    info!("\n{}", report);
                }
                Ok(report)
            }
            Err(e) => {
                match &e {
                    CycleError::CredentialInvalid(_) => {
                        self.stats.credential_failures += 1;
                        error!(error = %e, "Cycle aborted");
                    }
                    CycleError::DataUnavailable(_) => {
                        self.stats.aborted_cycles += 1;
                        warn!(error = %e, "Cycle aborted");
                    }
                }
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> &BotStats {
        &self.stats
    }
}

/// Bot statistics.
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub cycles: u64,
    pub monitor_only_cycles: u64,
    pub aborted_cycles: u64,
    pub credential_failures: u64,
    pub orders_executed: u64,
    pub orders_rejected: u64,
    pub stale_orders_cancelled: u64,
    pub instrument_issues: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
}

impl BotStats {
    fn record(&mut self, report: &CycleReport) {
        if report.mode == CycleMode::MonitorOnly {
            self.monitor_only_cycles += 1;
        }
        self.orders_executed += report.executed.len() as u64;
        self.orders_rejected += report.rejections().count() as u64;
        self.stale_orders_cancelled += report.cancelled_orders.len() as u64;
        self.instrument_issues += report.issues.len() as u64;
        self.last_cycle_at = Some(report.started_at);
    }
}

impl std::fmt::Display for BotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "Cycles:          {} (Monitor only: {}, Aborted: {})",
            self.cycles, self.monitor_only_cycles, self.aborted_cycles + self.credential_failures)?;
        writeln!(f, "Orders:          {} (Rejected: {})",
            self.orders_executed, self.orders_rejected)?;
        writeln!(f, "Stale Cancelled: {}", self.stale_orders_cancelled)?;
        writeln!(f, "Issues:          {}", self.instrument_issues)?;
        writeln!(f, "Token Failures:  {}", self.credential_failures)?;
        match self.last_cycle_at {
            Some(at) => writeln!(f, "Last Cycle:      {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?,
            None => writeln!(f, "Last Cycle:      never")?,
        }
        writeln!(f, "Mode:            {}", if self.dry_run { "Dry Run" } else { "Live" })?;
        Ok(())
    }
}
