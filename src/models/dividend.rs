//! Dividend calendar entries.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upcoming or past dividend for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dividend {
    /// Latest instant at which shares must be held to qualify
    pub last_buy_date: DateTime<Utc>,

    /// Net dividend amount per share
    pub dividend_net: Decimal,

    /// Expected payment date, when announced
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

impl Dividend {
    pub fn new(last_buy_date: DateTime<Utc>, dividend_net: Decimal) -> Self {
        Self {
            last_buy_date,
            dividend_net,
            payment_date: None,
        }
    }

    /// Cutoff is strictly in the future but no further than `lookahead` away.
    pub fn is_upcoming(&self, now: DateTime<Utc>, lookahead: Duration) -> bool {
        self.last_buy_date > now && self.last_buy_date <= now + lookahead
    }

    /// Cutoff is at or before `now`.
    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        self.last_buy_date <= now
    }
}

/// Sort dividends by ascending cutoff, the order every consumer relies on.
pub fn sort_by_cutoff(dividends: &mut [Dividend]) {
    dividends.sort_by_key(|d| d.last_buy_date);
}
