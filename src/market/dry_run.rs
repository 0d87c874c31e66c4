//! Dry-run decorator: performs every read against the wrapped service but
//! never places or cancels orders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{Dividend, Instrument, LastPrice, OrderId, OrderState, Portfolio};

use super::{MarketError, MarketService};

pub struct DryRunMarket<M> {
    inner: M,
}

impl<M: MarketService> DryRunMarket<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    fn simulated_id() -> OrderId {
        OrderId(format!("dry-run-{}", uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl<M: MarketService> MarketService for DryRunMarket<M> {
    async fn validate_token(&self) -> Result<(), MarketError> {
        self.inner.validate_token().await
    }

    async fn is_working_hours(&self) -> Result<bool, MarketError> {
        self.inner.is_working_hours().await
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    async fn get_portfolio(&self) -> Result<Portfolio, MarketError> {
        self.inner.get_portfolio().await
    }

    async fn get_instrument(&self, figi: &str) -> Result<Instrument, MarketError> {
        self.inner.get_instrument(figi).await
    }

    async fn get_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, MarketError> {
        self.inner.get_dividends(figi, from, to).await
    }

    async fn get_last_price(&self, figi: &str) -> Result<Option<LastPrice>, MarketError> {
        self.inner.get_last_price(figi).await
    }

    async fn buy_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        let id = Self::simulated_id();
        info!(figi = %figi, lots = lots, order_id = %id, "[DRY RUN] Would buy");
        Ok(id)
    }

    async fn sell_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        let id = Self::simulated_id();
        info!(figi = %figi, lots = lots, order_id = %id, "[DRY RUN] Would sell");
        Ok(id)
    }

    async fn get_orders(&self) -> Result<Vec<OrderState>, MarketError> {
        self.inner.get_orders().await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), MarketError> {
        info!(order_id = %order_id, "[DRY RUN] Would cancel order");
        Ok(())
    }
}
