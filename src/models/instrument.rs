//! Instrument metadata as reported by the brokerage.

use serde::{Deserialize, Serialize};

/// Instrument type string used by the brokerage for ordinary shares.
pub const SHARE: &str = "share";

/// Tradable security identified by its FIGI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Financial Instrument Global Identifier
    pub figi: String,

    /// Exchange ticker for display
    #[serde(default)]
    pub ticker: String,

    /// Shares per lot (minimum tradable unit)
    pub lot: u32,

    /// Instrument type (e.g., "share", "bond", "currency")
    #[serde(default = "default_type")]
    pub instrument_type: String,

    /// Trading currency
    #[serde(default)]
    pub currency: String,
}

fn default_type() -> String {
    SHARE.to_string()
}

impl Instrument {
    /// Create a share with the given lot size.
    pub fn share(figi: impl Into<String>, lot: u32) -> Self {
        Self {
            figi: figi.into(),
            ticker: String::new(),
            lot,
            instrument_type: SHARE.to_string(),
            currency: String::new(),
        }
    }

    /// Display name: ticker when known, FIGI otherwise.
    pub fn display_name(&self) -> &str {
        if self.ticker.is_empty() {
            &self.figi
        } else {
            &self.ticker
        }
    }

    /// Lot size usable in cost arithmetic. A zero lot from a broken feed is
    /// treated as one share per lot.
    pub fn lot_size(&self) -> u32 {
        self.lot.max(1)
    }
}
