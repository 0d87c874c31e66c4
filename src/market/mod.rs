//! Brokerage capability the decision engine depends on.
//!
//! Everything the engine knows about the outside world comes through
//! [`MarketService`]:
//! - Portfolio snapshot and cash
//! - Instrument metadata (lot size)
//! - Dividend calendar and last prices
//! - Trading-session status and the current time
//! - Order placement, listing and cancellation

mod dry_run;
#[cfg(test)]
pub mod fake;
mod session;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Dividend, Instrument, LastPrice, OrderId, OrderState, Portfolio};

pub use dry_run::DryRunMarket;
pub use session::SessionConfig;

/// Failures reported by a [`MarketService`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl MarketError {
    /// Worth retrying an idempotent read.
    pub fn is_transient(&self) -> bool {
        matches!(self, MarketError::Unavailable(_))
    }
}

/// Brokerage capability surface.
///
/// Reads may lag behind submitted orders. `buy_market` and `sell_market` are
/// not idempotent: calling twice places two orders.
#[async_trait]
pub trait MarketService: Send + Sync {
    /// Credential health check, consulted once per cycle before any mutating call.
    async fn validate_token(&self) -> Result<(), MarketError>;

    /// Whether order submission is currently permitted.
    async fn is_working_hours(&self) -> Result<bool, MarketError>;

    /// Current time. Single source of truth for every decision in a cycle.
    fn now(&self) -> DateTime<Utc>;

    async fn get_portfolio(&self) -> Result<Portfolio, MarketError>;

    /// Fails with [`MarketError::NotFound`] if the FIGI is unknown.
    async fn get_instrument(&self, figi: &str) -> Result<Instrument, MarketError>;

    /// Dividends with a cutoff inside `[from, to]`, ascending by cutoff.
    /// Empty when none are known.
    async fn get_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, MarketError>;

    /// `None` when no quote is available.
    async fn get_last_price(&self, figi: &str) -> Result<Option<LastPrice>, MarketError>;

    async fn buy_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError>;

    async fn sell_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError>;

    async fn get_orders(&self) -> Result<Vec<OrderState>, MarketError>;

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), MarketError>;
}

#[async_trait]
impl<M: MarketService + ?Sized> MarketService for Arc<M> {
    async fn validate_token(&self) -> Result<(), MarketError> {
        (**self).validate_token().await
    }

    async fn is_working_hours(&self) -> Result<bool, MarketError> {
        (**self).is_working_hours().await
    }

    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    async fn get_portfolio(&self) -> Result<Portfolio, MarketError> {
        (**self).get_portfolio().await
    }

    async fn get_instrument(&self, figi: &str) -> Result<Instrument, MarketError> {
        (**self).get_instrument(figi).await
    }

    async fn get_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, MarketError> {
        (**self).get_dividends(figi, from, to).await
    }

    async fn get_last_price(&self, figi: &str) -> Result<Option<LastPrice>, MarketError> {
        (**self).get_last_price(figi).await
    }

    async fn buy_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        (**self).buy_market(figi, lots).await
    }

    async fn sell_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        (**self).sell_market(figi, lots).await
    }

    async fn get_orders(&self) -> Result<Vec<OrderState>, MarketError> {
        (**self).get_orders().await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), MarketError> {
        (**self).cancel_order(order_id).await
    }
}
