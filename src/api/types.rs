//! Request and response types for the Tinkoff Invest REST gateway.
//!
//! The gateway is a JSON transcoding of the gRPC contract: field names are
//! camelCase, int64 values arrive as strings, money is split into integer
//! units and nano-units.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Dividend, Instrument, LastPrice, OrderDirection, OrderId, OrderState, OrderStatus,
    PortfolioPosition, SHARE,
};

/// int64 fields are strings in proto3 JSON, but some proxies emit numbers.
fn int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn default_zero() -> i64 {
    0
}

// ==================== Money ====================

/// Fixed-point number: `units + nano / 10^9`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Quotation {
    #[serde(default = "default_zero", deserialize_with = "int64")]
    pub units: i64,
    #[serde(default)]
    pub nano: i32,
}

impl Quotation {
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.units) + Decimal::new(i64::from(self.nano), 9)
    }
}

/// Amount of money in a currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MoneyValue {
    #[serde(default)]
    pub currency: String,
    #[serde(default = "default_zero", deserialize_with = "int64")]
    pub units: i64,
    #[serde(default)]
    pub nano: i32,
}

impl MoneyValue {
    pub fn to_decimal(&self) -> Decimal {
        Quotation {
            units: self.units,
            nano: self.nano,
        }
        .to_decimal()
    }

    pub fn is_currency(&self, code: &str) -> bool {
        self.currency.eq_ignore_ascii_case(code)
    }
}

fn decimal_of(value: &Option<MoneyValue>) -> Decimal {
    value.as_ref().map(MoneyValue::to_decimal).unwrap_or_default()
}

fn quotation_of(value: &Option<Quotation>) -> Decimal {
    value.as_ref().map(Quotation::to_decimal).unwrap_or_default()
}

// ==================== Users ====================

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl Account {
    pub fn is_open(&self) -> bool {
        self.status.is_empty() || self.status == "ACCOUNT_STATUS_OPEN"
    }
}

// ==================== Operations ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRequest<'a> {
    pub account_id: &'a str,
    pub currency: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest<'a> {
    pub account_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    #[serde(default)]
    pub total_amount_shares: Option<MoneyValue>,
    #[serde(default)]
    pub positions: Vec<PortfolioPositionDto>,
}

impl PortfolioResponse {
    pub fn total_shares_value(&self) -> Decimal {
        decimal_of(&self.total_amount_shares)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPositionDto {
    pub figi: String,
    #[serde(default)]
    pub instrument_type: String,
    #[serde(default)]
    pub quantity: Option<Quotation>,
    #[serde(default)]
    pub quantity_lots: Option<Quotation>,
    #[serde(default)]
    pub average_position_price: Option<MoneyValue>,
    #[serde(default)]
    pub current_price: Option<MoneyValue>,
}

impl From<PortfolioPositionDto> for PortfolioPosition {
    fn from(p: PortfolioPositionDto) -> Self {
        PortfolioPosition {
            quantity: quotation_of(&p.quantity),
            quantity_lots: quotation_of(&p.quantity_lots),
            average_price: decimal_of(&p.average_position_price),
            current_price: decimal_of(&p.current_price),
            figi: p.figi,
            instrument_type: p.instrument_type,
        }
    }
}

/// Free balances from `GetPositions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub money: Vec<MoneyValue>,
}

impl PositionsResponse {
    pub fn cash_in(&self, currency: &str) -> Decimal {
        self.money
            .iter()
            .filter(|m| m.is_currency(currency))
            .map(MoneyValue::to_decimal)
            .sum()
    }
}

// ==================== Instruments ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRequest<'a> {
    pub id_type: &'a str,
    pub id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareResponse {
    pub instrument: ShareDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDto {
    pub figi: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub lot: u32,
    #[serde(default)]
    pub currency: String,
}

impl From<ShareDto> for Instrument {
    fn from(s: ShareDto) -> Self {
        Instrument {
            figi: s.figi,
            ticker: s.ticker,
            lot: s.lot,
            instrument_type: SHARE.to_string(),
            currency: s.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendsRequest<'a> {
    pub figi: &'a str,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DividendsResponse {
    #[serde(default)]
    pub dividends: Vec<DividendDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendDto {
    #[serde(default)]
    pub dividend_net: Option<MoneyValue>,
    #[serde(default)]
    pub last_buy_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

impl DividendDto {
    /// Entries without a cutoff date are unusable and dropped.
    pub fn into_dividend(self) -> Option<Dividend> {
        let last_buy_date = self.last_buy_date?;
        Some(Dividend {
            last_buy_date,
            dividend_net: decimal_of(&self.dividend_net),
            payment_date: self.payment_date,
        })
    }
}

// ==================== Market data ====================

#[derive(Debug, Clone, Serialize)]
pub struct LastPricesRequest<'a> {
    pub figi: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPricesResponse {
    #[serde(default)]
    pub last_prices: Vec<LastPriceDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastPriceDto {
    pub figi: String,
    #[serde(default)]
    pub price: Option<Quotation>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl LastPriceDto {
    /// A quote without a price (or a zero price) means no trades yet.
    pub fn into_last_price(self) -> Option<LastPrice> {
        let price = self.price?.to_decimal();
        if price.is_zero() {
            return None;
        }
        Some(LastPrice {
            figi: self.figi,
            price,
            time: self.time,
        })
    }
}

// ==================== Orders ====================

pub const ORDER_TYPE_MARKET: &str = "ORDER_TYPE_MARKET";

pub fn direction_code(direction: OrderDirection) -> &'static str {
    match direction {
        OrderDirection::Buy => "ORDER_DIRECTION_BUY",
        OrderDirection::Sell => "ORDER_DIRECTION_SELL",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOrderRequest<'a> {
    pub figi: &'a str,
    /// int64 on the wire
    pub quantity: String,
    pub direction: &'static str,
    pub account_id: &'a str,
    pub order_type: &'static str,
    /// Client idempotency key
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOrderResponse {
    pub order_id: String,
    #[serde(default)]
    pub execution_report_status: String,
    #[serde(default)]
    pub message: String,
}

impl PostOrderResponse {
    pub fn is_rejected(&self) -> bool {
        status_of(&self.execution_report_status) == OrderStatus::Rejected
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest<'a> {
    pub account_id: &'a str,
    pub order_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderStateDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStateDto {
    pub order_id: String,
    pub figi: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default = "default_zero", deserialize_with = "int64")]
    pub lots_requested: i64,
    #[serde(default = "default_zero", deserialize_with = "int64")]
    pub lots_executed: i64,
    #[serde(default)]
    pub execution_report_status: String,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
}

pub fn status_of(code: &str) -> OrderStatus {
    match code {
        "EXECUTION_REPORT_STATUS_NEW" => OrderStatus::New,
        "EXECUTION_REPORT_STATUS_PARTIALLYFILL" => OrderStatus::PartiallyFilled,
        "EXECUTION_REPORT_STATUS_FILL" => OrderStatus::Filled,
        "EXECUTION_REPORT_STATUS_REJECTED" => OrderStatus::Rejected,
        "EXECUTION_REPORT_STATUS_CANCELLED" => OrderStatus::Cancelled,
        _ => OrderStatus::Unknown,
    }
}

impl OrderStateDto {
    /// Orders with an unrecognized direction are skipped.
    pub fn into_order_state(self) -> Option<OrderState> {
        let direction = match self.direction.as_str() {
            "ORDER_DIRECTION_BUY" => OrderDirection::Buy,
            "ORDER_DIRECTION_SELL" => OrderDirection::Sell,
            _ => return None,
        };

        Some(OrderState {
            order_id: OrderId(self.order_id),
            figi: self.figi,
            direction,
            lots_requested: u32::try_from(self.lots_requested).unwrap_or(0),
            lots_executed: u32::try_from(self.lots_executed).unwrap_or(0),
            status: status_of(&self.execution_report_status),
            created_at: self.order_date,
        })
    }
}

/// Error body returned alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
