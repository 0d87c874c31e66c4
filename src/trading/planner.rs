//! Pure decision logic: classify each instrument against its dividend calendar
//! and turn the result into a cash-bounded set of order intents.
//!
//! Nothing here talks to the brokerage. The engine gathers an
//! [`InstrumentSnapshot`] per instrument and hands them over in FIGI order.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::models::{Dividend, Instrument, OrderIntent};

use super::error::EngineError;

/// Where an instrument stands relative to its dividend cutoffs this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentState {
    /// Nothing to do
    NoAction,
    /// Cutoff ahead, below target
    Accumulating { lots_to_buy: u32 },
    /// Cutoff ahead, at or above target
    HoldingForPayout,
    /// Cutoff passed, still holding
    Liquidating { lots: u32 },
}

/// Derive the state of one instrument from scratch.
///
/// `dividends` only needs to cover the window the engine queried; a cutoff
/// inside the lookahead takes precedence over a passed one.
pub fn classify(
    dividends: &[Dividend],
    held_lots: u32,
    target_lots: u32,
    now: DateTime<Utc>,
    lookahead: Duration,
) -> InstrumentState {
    let has_upcoming = dividends.iter().any(|d| d.is_upcoming(now, lookahead));
    if has_upcoming {
        return if held_lots < target_lots {
            InstrumentState::Accumulating {
                lots_to_buy: target_lots - held_lots,
            }
        } else {
            InstrumentState::HoldingForPayout
        };
    }

    let has_passed = dividends.iter().any(|d| d.has_passed(now));
    if has_passed && held_lots > 0 {
        return InstrumentState::Liquidating { lots: held_lots };
    }

    InstrumentState::NoAction
}

/// Everything the planner needs to know about one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentSnapshot {
    pub figi: String,
    pub instrument: Instrument,
    pub held_lots: u32,
    pub target_lots: u32,
    pub state: InstrumentState,
    /// Last price; only fetched for instruments being accumulated
    pub price: Option<Decimal>,
}

/// Running reservation against the cash balance read at cycle start.
#[derive(Debug, Clone)]
pub struct CashReservation {
    available: Decimal,
    reserved: Decimal,
}

impl CashReservation {
    /// Available cash is the balance minus the reserve floor, never negative.
    pub fn new(total_cash: Decimal, reserve_floor: Decimal) -> Self {
        Self {
            available: (total_cash - reserve_floor).max(Decimal::ZERO),
            reserved: Decimal::ZERO,
        }
    }

    /// Reserve `cost` if it fits in what remains.
    pub fn try_reserve(&mut self, cost: Decimal) -> bool {
        if cost > self.remaining() {
            return false;
        }
        self.reserved += cost;
        true
    }

    /// Cash available at cycle start.
    pub fn available(&self) -> Decimal {
        self.available
    }

    pub fn reserved(&self) -> Decimal {
        self.reserved
    }

    pub fn remaining(&self) -> Decimal {
        self.available - self.reserved
    }
}

/// Intents for one cycle: sells first, then buys, each in FIGI order.
#[derive(Debug, Clone)]
pub struct Plan {
    pub intents: Vec<OrderIntent>,
    pub issues: Vec<(String, EngineError)>,
    pub reservation: CashReservation,
}

/// Turn classified snapshots into order intents, reserving cash for buys in
/// the order the snapshots are given.
pub fn build_plan(snapshots: &[InstrumentSnapshot], mut reservation: CashReservation) -> Plan {
    let mut sells = Vec::new();
    let mut buys = Vec::new();
    let mut issues = Vec::new();

    for snapshot in snapshots {
        match snapshot.state {
            InstrumentState::NoAction => {}
            InstrumentState::HoldingForPayout => {
                debug!(
                    figi = %snapshot.figi,
                    held = snapshot.held_lots,
                    target = snapshot.target_lots,
                    "At target, holding for payout"
                );
            }
            InstrumentState::Liquidating { lots } => {
                info!(figi = %snapshot.figi, lots = lots, "Cutoff passed, planning sell");
                sells.push(OrderIntent::sell(&snapshot.figi, lots));
            }
            InstrumentState::Accumulating { lots_to_buy } => {
                let price = match snapshot.price {
                    Some(price) if price > Decimal::ZERO => price,
                    _ => {
                        warn!(figi = %snapshot.figi, "No last price, skipping buy");
                        issues.push((
                            snapshot.figi.clone(),
                            EngineError::DataUnavailable("no last price".to_string()),
                        ));
                        continue;
                    }
                };

                let cost = Decimal::from(lots_to_buy)
                    * Decimal::from(snapshot.instrument.lot_size())
                    * price;

                if !reservation.try_reserve(cost) {
                    warn!(
                        figi = %snapshot.figi,
                        cost = %cost,
                        remaining = %reservation.remaining(),
                        "Not enough cash for buy"
                    );
                    issues.push((
                        snapshot.figi.clone(),
                        EngineError::InsufficientCash {
                            required: cost,
                            available: reservation.remaining(),
                        },
                    ));
                    continue;
                }

                info!(
                    figi = %snapshot.figi,
                    lots = lots_to_buy,
                    price = %price,
                    cost = %cost,
                    "Cutoff ahead, planning buy"
                );
                buys.push(OrderIntent::buy(&snapshot.figi, lots_to_buy, cost));
            }
        }
    }

    sells.extend(buys);
    Plan {
        intents: sells,
        issues,
        reservation,
    }
}
