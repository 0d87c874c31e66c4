//! Last traded price quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last traded price for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPrice {
    pub figi: String,
    pub price: Decimal,
    /// When the quote was taken, if the venue reports it
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl LastPrice {
    pub fn new(figi: impl Into<String>, price: Decimal) -> Self {
        Self {
            figi: figi.into(),
            price,
            time: None,
        }
    }
}
