//! Portfolio snapshot: positions held in the brokerage account plus cash.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instrument::SHARE;

/// Current holding of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    /// Instrument FIGI
    pub figi: String,

    /// Instrument type as reported by the brokerage
    pub instrument_type: String,

    /// Number of shares (units) held
    pub quantity: Decimal,

    /// Number of lots held (may be fractional for odd-lot leftovers)
    pub quantity_lots: Decimal,

    /// Average acquisition price per share
    pub average_price: Decimal,

    /// Current market price per share
    pub current_price: Decimal,
}

impl PortfolioPosition {
    /// Create a share position from a lot count.
    pub fn share(
        figi: impl Into<String>,
        lots: u32,
        lot_size: u32,
        average_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        Self {
            figi: figi.into(),
            instrument_type: SHARE.to_string(),
            quantity: Decimal::from(lots) * Decimal::from(lot_size),
            quantity_lots: Decimal::from(lots),
            average_price,
            current_price,
        }
    }

    /// Whole lots held. Fractions and short (negative) holdings count as zero.
    pub fn held_lots(&self) -> u32 {
        if self.quantity_lots <= Decimal::ZERO {
            return 0;
        }
        self.quantity_lots.trunc().to_u32().unwrap_or(u32::MAX)
    }

    /// Whether this position is an ordinary share.
    pub fn is_share(&self) -> bool {
        self.instrument_type == SHARE
    }

    /// Current market value of the position.
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// Unrealized P&L against the average acquisition price.
    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.average_price) * self.quantity
    }
}

/// Snapshot of the brokerage account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub positions: Vec<PortfolioPosition>,

    /// Total market value of share positions
    pub total_shares_value: Decimal,

    /// Cash balance available for trading
    pub total_cash: Decimal,
}

impl Portfolio {
    /// Find the position for an instrument.
    pub fn position(&self, figi: &str) -> Option<&PortfolioPosition> {
        self.positions.iter().find(|p| p.figi == figi)
    }

    /// Whole lots held for an instrument, zero when not held.
    pub fn held_lots(&self, figi: &str) -> u32 {
        self.position(figi).map_or(0, PortfolioPosition::held_lots)
    }

    /// FIGIs of share positions.
    pub fn share_figis(&self) -> impl Iterator<Item = &str> {
        self.positions
            .iter()
            .filter(|p| p.is_share())
            .map(|p| p.figi.as_str())
    }

    /// Total account value (shares plus cash).
    pub fn total_value(&self) -> Decimal {
        self.total_shares_value + self.total_cash
    }
}
