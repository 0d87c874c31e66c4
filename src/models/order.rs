//! Orders: what the engine intends to do and what the brokerage reports back.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Buy,
    Sell,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Buy => "BUY",
            OrderDirection::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Brokerage-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A market order the engine plans to submit this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub figi: String,
    pub direction: OrderDirection,
    /// Whole lots, always at least one
    pub lots: u32,
    /// Estimated cost reserved against cash (zero for sells)
    pub estimated_cost: Decimal,
}

impl OrderIntent {
    pub fn buy(figi: impl Into<String>, lots: u32, estimated_cost: Decimal) -> Self {
        Self {
            figi: figi.into(),
            direction: OrderDirection::Buy,
            lots,
            estimated_cost,
        }
    }

    pub fn sell(figi: impl Into<String>, lots: u32) -> Self {
        Self {
            figi: figi.into(),
            direction: OrderDirection::Sell,
            lots,
            estimated_cost: Decimal::ZERO,
        }
    }
}

/// Execution status of an order at the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Rejected,
    Cancelled,
    Unknown,
}

impl OrderStatus {
    /// Order can still trade.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// An order as listed by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub order_id: OrderId,
    pub figi: String,
    pub direction: OrderDirection,
    pub lots_requested: u32,
    pub lots_executed: u32,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderState {
    /// Active order older than `max_age`. Orders without a creation time are
    /// never considered stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.status.is_active()
            && self
                .created_at
                .is_some_and(|created| now - created >= max_age)
    }
}
