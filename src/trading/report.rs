//! Summary of one engine cycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{OrderDirection, OrderId, OrderIntent};

use super::error::EngineError;

/// Whether the cycle was allowed to place orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    Trading,
    /// Outside working hours: plan derived and reported, nothing submitted
    MonitorOnly,
}

/// An intent the brokerage accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedOrder {
    pub intent: OrderIntent,
    pub order_id: OrderId,
}

/// A problem confined to one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentIssue {
    pub figi: String,
    pub error: EngineError,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub mode: CycleMode,
    /// Cash balance read at cycle start
    pub cash_at_start: Decimal,
    /// Cash usable for buys (balance minus reserve floor)
    pub available_at_start: Decimal,
    /// Sum of planned buy costs
    pub reserved: Decimal,
    pub planned: Vec<OrderIntent>,
    pub executed: Vec<ExecutedOrder>,
    pub issues: Vec<InstrumentIssue>,
    pub cancelled_orders: Vec<OrderId>,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, mode: CycleMode, cash_at_start: Decimal) -> Self {
        Self {
            started_at,
            mode,
            cash_at_start,
            available_at_start: Decimal::ZERO,
            reserved: Decimal::ZERO,
            planned: Vec::new(),
            executed: Vec::new(),
            issues: Vec::new(),
            cancelled_orders: Vec::new(),
        }
    }

    pub fn add_issue(&mut self, figi: impl Into<String>, error: EngineError) {
        self.issues.push(InstrumentIssue {
            figi: figi.into(),
            error,
        });
    }

    /// Cash left after every planned buy.
    pub fn remaining_cash(&self) -> Decimal {
        self.available_at_start - self.reserved
    }

    pub fn issues_for<'a>(&'a self, figi: &'a str) -> impl Iterator<Item = &'a EngineError> + 'a {
        self.issues
            .iter()
            .filter(move |i| i.figi == figi)
            .map(|i| &i.error)
    }

    /// Orders the brokerage rejected this cycle.
    pub fn rejections(&self) -> impl Iterator<Item = &InstrumentIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i.error, EngineError::OrderRejected(_)))
    }

    pub fn executed_lots(&self, figi: &str, direction: OrderDirection) -> Option<u32> {
        self.executed
            .iter()
            .find(|e| e.intent.figi == figi && e.intent.direction == direction)
            .map(|e| e.intent.lots)
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Cycle {} ===", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Mode:            {}",
            match self.mode {
                CycleMode::Trading => "Trading",
                CycleMode::MonitorOnly => "Monitor only (market closed)",
            }
        )?;
        writeln!(f, "Cash at start:   {:.2}", self.cash_at_start)?;
        writeln!(f, "Reserved:        {:.2}", self.reserved)?;
        writeln!(f, "Remaining:       {:.2}", self.remaining_cash())?;

        writeln!(f, "Planned:         {}", self.planned.len())?;
        for intent in &self.planned {
            writeln!(f, "  {:<4} {:<14} {:>6} lots", intent.direction, intent.figi, intent.lots)?;
        }

        writeln!(f, "Executed:        {}", self.executed.len())?;
        for order in &self.executed {
            writeln!(
                f,
                "  {:<4} {:<14} {:>6} lots  #{}",
                order.intent.direction, order.intent.figi, order.intent.lots, order.order_id
            )?;
        }

        if !self.cancelled_orders.is_empty() {
            writeln!(f, "Cancelled:       {}", self.cancelled_orders.len())?;
        }

        if !self.issues.is_empty() {
            writeln!(f, "Issues:          {}", self.issues.len())?;
            for issue in &self.issues {
                writeln!(f, "  {:<14} {}", issue.figi, issue.error)?;
            }
        }
        Ok(())
    }
}
