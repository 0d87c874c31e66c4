//! Exchange trading-session window.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Main session of the exchange, in exchange-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Exchange offset from UTC in hours (Moscow is +3)
    pub utc_offset_hours: i32,

    /// Session open, exchange-local
    pub open: NaiveTime,

    /// Session close, exchange-local (exclusive)
    pub close: NaiveTime,

    /// Trade on Saturdays and Sundays too
    pub weekends: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 3,
            open: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(18, 40, 0).unwrap_or(NaiveTime::MIN),
            weekends: false,
        }
    }
}

impl SessionConfig {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Whether `now` falls inside the session window.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset());

        if !self.weekends && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        time >= self.open && time < self.close
    }
}
