//! Decision engine configuration.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Upper bound for any dividend window, and how far back a held share with no
/// dividend in the regular window is searched for its last cutoff.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Thresholds and targets the engine decides against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target lot count per instrument (FIGI -> lots)
    pub targets: BTreeMap<String, u32>,

    /// Target for instruments without an explicit entry (0 = never buy)
    pub default_target_lots: u32,

    /// How far ahead a dividend cutoff may be for accumulation to start
    pub lookahead_days: i64,

    /// How far back to look for passed cutoffs when deciding to liquidate
    pub dividend_history_days: i64,

    /// Cash that must remain untouched by planned buys
    pub cash_reserve_floor: Decimal,

    /// Timeout for every brokerage call (milliseconds)
    pub call_timeout_ms: u64,

    /// Active orders older than this are cancelled (seconds)
    pub stale_order_after_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            targets: BTreeMap::new(),
            default_target_lots: 0,
            lookahead_days: 14,           // Two weeks before cutoff
            dividend_history_days: 30,    // Sell within a month after cutoff
            cash_reserve_floor: dec!(0),
            call_timeout_ms: 10_000,      // 10s per call
            stale_order_after_secs: 900,  // 15 min
        }
    }
}

impl EngineConfig {
    /// Target lots for an instrument.
    pub fn target_for(&self, figi: &str) -> u32 {
        self.targets
            .get(figi)
            .copied()
            .unwrap_or(self.default_target_lots)
    }

    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookahead_days)
    }

    pub fn dividend_history(&self) -> chrono::Duration {
        chrono::Duration::days(self.dividend_history_days)
    }

    /// Window searched when a held share has no dividend in the regular one.
    pub fn liquidation_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(MAX_WINDOW_DAYS)
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.call_timeout_ms)
    }

    pub fn stale_order_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_order_after_secs)
    }

    /// Reject configurations the engine cannot act on sensibly.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.lookahead_days) {
            bail!(
                "lookahead_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.lookahead_days
            );
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.dividend_history_days) {
            bail!(
                "dividend_history_days must be between 0 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.dividend_history_days
            );
        }
        if self.stale_order_after_secs <= 0 {
            bail!(
                "stale_order_after_secs must be positive, got {}",
                self.stale_order_after_secs
            );
        }
        if self.cash_reserve_floor < Decimal::ZERO {
            bail!("cash_reserve_floor must not be negative");
        }
        if self.call_timeout_ms == 0 {
            bail!("call_timeout_ms must be positive");
        }
        if let Some(figi) = self.targets.keys().find(|f| f.trim().is_empty()) {
            bail!("empty FIGI in targets: {:?}", figi);
        }
        Ok(())
    }
}

/// Parse a `FIGI=LOTS` target, as accepted on the command line.
pub fn parse_target(s: &str) -> Result<(String, u32)> {
    let (figi, lots) = s
        .split_once('=')
        .with_context(|| format!("target must look like FIGI=LOTS, got '{}'", s))?;

    let figi = figi.trim();
    if figi.is_empty() {
        bail!("target '{}' has an empty FIGI", s);
    }

    let lots = lots
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid lot count in target '{}'", s))?;

    Ok((figi.to_string(), lots))
}
