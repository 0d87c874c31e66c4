//! Deterministic in-memory [`MarketService`] for tests.
//!
//! Pre-register the buys and sells a scenario should produce with
//! [`FakeMarket::expect_buy`] / [`FakeMarket::expect_sell`], run a cycle, then
//! call [`FakeMarket::assert_all_orders_done`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{
    Dividend, Instrument, LastPrice, OrderDirection, OrderId, OrderState, OrderStatus, Portfolio,
    PortfolioPosition,
};

use super::{MarketError, MarketService};

/// Default lot size for every instrument.
pub const LOT: u32 = 10;

#[derive(Default)]
struct FakeState {
    positions: BTreeMap<String, PortfolioPosition>,
    lot_overrides: HashMap<String, u32>,
    unknown_instruments: HashSet<String>,
    cash: Decimal,
    working_hours: bool,
    session_error: bool,
    token_error: Option<String>,
    dividends: HashMap<String, Vec<Dividend>>,
    prices: HashMap<String, Decimal>,
    orders: Vec<OrderState>,
    cancelled: Vec<OrderId>,
    rejected_buys: HashSet<String>,
    hanging_dividends: HashSet<String>,
    expected_buys: HashMap<String, u32>,
    unexpected_buys: Vec<String>,
    expected_sells: HashMap<String, u32>,
    unexpected_sells: Vec<String>,
    submitted: Vec<(String, OrderDirection, u32)>,
    mutating_calls: usize,
    next_order: u64,
}

pub struct FakeMarket {
    now: DateTime<Utc>,
    state: Mutex<FakeState>,
}

impl Default for FakeMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMarket {
    pub fn new() -> Self {
        Self {
            now: Utc::now(),
            state: Mutex::new(FakeState {
                cash: dec!(100000),
                working_hours: true,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn lot_for(state: &FakeState, figi: &str) -> u32 {
        state.lot_overrides.get(figi).copied().unwrap_or(LOT)
    }

    // ==================== Scenario setup ====================

    pub fn set_cash(&self, cash: Decimal) {
        self.state().cash = cash;
    }

    pub fn set_working_hours(&self, working: bool) {
        self.state().working_hours = working;
    }

    /// Make the session check fail instead of answering.
    pub fn fail_session_check(&self) {
        self.state().session_error = true;
    }

    pub fn set_token_error(&self, error: &str) {
        self.state().token_error = Some(error.to_string());
    }

    pub fn set_lot(&self, figi: &str, lot: u32) {
        self.state().lot_overrides.insert(figi.to_string(), lot);
    }

    pub fn set_unknown_instrument(&self, figi: &str) {
        self.state().unknown_instruments.insert(figi.to_string());
    }

    pub fn add_position(&self, figi: &str, lots: u32, average_price: Decimal, current_price: Decimal) {
        let mut state = self.state();
        let lot = Self::lot_for(&state, figi);
        let position = PortfolioPosition::share(figi, lots, lot, average_price, current_price);
        state.positions.insert(figi.to_string(), position);
    }

    pub fn add_dividend(&self, figi: &str, last_buy_date: DateTime<Utc>, dividend_net: Decimal) {
        let mut state = self.state();
        let dividends = state.dividends.entry(figi.to_string()).or_default();
        dividends.push(Dividend::new(last_buy_date, dividend_net));
        dividends.sort_by_key(|d| d.last_buy_date);
    }

    pub fn set_last_price(&self, figi: &str, price: Decimal) {
        self.state().prices.insert(figi.to_string(), price);
    }

    pub fn add_order(&self, order: OrderState) {
        self.state().orders.push(order);
    }

    pub fn reject_buys_for(&self, figi: &str) {
        self.state().rejected_buys.insert(figi.to_string());
    }

    /// Make dividend lookups for `figi` hang far beyond any sane timeout.
    pub fn hang_dividends_for(&self, figi: &str) {
        self.state().hanging_dividends.insert(figi.to_string());
    }

    pub fn expect_buy(&self, figi: &str, lots: u32) {
        self.state().expected_buys.insert(figi.to_string(), lots);
    }

    pub fn expect_sell(&self, figi: &str, lots: u32) {
        self.state().expected_sells.insert(figi.to_string(), lots);
    }

    // ==================== Inspection ====================

    pub fn mutating_calls(&self) -> usize {
        self.state().mutating_calls
    }

    pub fn submitted(&self) -> Vec<(String, OrderDirection, u32)> {
        self.state().submitted.clone()
    }

    pub fn cancelled(&self) -> Vec<OrderId> {
        self.state().cancelled.clone()
    }

    /// Panics unless every expected order arrived exactly once with the
    /// expected lot count and nothing else was submitted.
    pub fn assert_all_orders_done(&self) {
        let state = self.state();
        if !state.expected_buys.is_empty() || !state.expected_sells.is_empty() {
            panic!(
                "Not all expected operations are done: buys {:?}, sells {:?}",
                state.expected_buys, state.expected_sells
            );
        }
        if !state.unexpected_sells.is_empty() {
            panic!("Unexpected sells for figis: {}", state.unexpected_sells.join(", "));
        }
        if !state.unexpected_buys.is_empty() {
            panic!("Unexpected buys for figis: {}", state.unexpected_buys.join(", "));
        }
    }

    fn place(&self, figi: &str, direction: OrderDirection, lots: u32) -> Result<OrderId, MarketError> {
        let mut state = self.state();
        state.mutating_calls += 1;

        if direction == OrderDirection::Buy && state.rejected_buys.contains(figi) {
            return Err(MarketError::OrderRejected(format!("not enough cash to buy {}", figi)));
        }

        let expected = match direction {
            OrderDirection::Buy => state.expected_buys.remove(figi),
            OrderDirection::Sell => state.expected_sells.remove(figi),
        };
        if expected != Some(lots) {
            match direction {
                OrderDirection::Buy => state.unexpected_buys.push(figi.to_string()),
                OrderDirection::Sell => state.unexpected_sells.push(figi.to_string()),
            }
        }

        state.submitted.push((figi.to_string(), direction, lots));
        state.next_order += 1;
        Ok(OrderId(format!("fake-{}", state.next_order)))
    }
}

#[async_trait]
impl MarketService for FakeMarket {
    async fn validate_token(&self) -> Result<(), MarketError> {
        match &self.state().token_error {
            Some(e) => Err(MarketError::Unauthorized(e.clone())),
            None => Ok(()),
        }
    }

    async fn is_working_hours(&self) -> Result<bool, MarketError> {
        let state = self.state();
        if state.session_error {
            return Err(MarketError::Unavailable("trading schedule".to_string()));
        }
        Ok(state.working_hours)
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    async fn get_portfolio(&self) -> Result<Portfolio, MarketError> {
        let state = self.state();
        let total_shares_value = state
            .positions
            .values()
            .map(|p| {
                let price = state.prices.get(&p.figi).copied().unwrap_or(p.current_price);
                price * p.quantity
            })
            .sum();

        Ok(Portfolio {
            positions: state.positions.values().cloned().collect(),
            total_shares_value,
            total_cash: state.cash,
        })
    }

    async fn get_instrument(&self, figi: &str) -> Result<Instrument, MarketError> {
        let state = self.state();
        if state.unknown_instruments.contains(figi) {
            return Err(MarketError::NotFound(format!("instrument {}", figi)));
        }
        Ok(Instrument::share(figi, Self::lot_for(&state, figi)))
    }

    async fn get_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, MarketError> {
        let hangs = self.state().hanging_dividends.contains(figi);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let state = self.state();
        Ok(state
            .dividends
            .get(figi)
            .map(|all| {
                all.iter()
                    .filter(|d| d.last_buy_date >= from && d.last_buy_date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_last_price(&self, figi: &str) -> Result<Option<LastPrice>, MarketError> {
        Ok(self
            .state()
            .prices
            .get(figi)
            .map(|price| LastPrice::new(figi, *price)))
    }

    async fn buy_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        self.place(figi, OrderDirection::Buy, lots)
    }

    async fn sell_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        self.place(figi, OrderDirection::Sell, lots)
    }

    async fn get_orders(&self) -> Result<Vec<OrderState>, MarketError> {
        Ok(self.state().orders.clone())
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), MarketError> {
        let mut state = self.state();
        state.mutating_calls += 1;
        state.cancelled.push(order_id.clone());
        if let Some(order) = state.orders.iter_mut().find(|o| &o.order_id == order_id) {
            order.status = OrderStatus::Cancelled;
        }
        Ok(())
    }
}
