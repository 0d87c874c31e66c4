//! Tinkoff Invest REST client implementing [`MarketService`].
//!
//! Every RPC is a `POST {base}/{service}/{method}` with a JSON body and a
//! bearer token. Reads are retried with exponential backoff on transient
//! failures; order placement and cancellation are sent exactly once.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::market::{MarketError, MarketService, SessionConfig};
use crate::models::{
    sort_by_cutoff, Dividend, Instrument, LastPrice, OrderDirection, OrderId, OrderState,
    Portfolio, PortfolioPosition,
};

use super::types::*;

/// REST gateway base URLs
pub const PROD_URL: &str = "https://invest-public-api.tinkoff.ru/rest";
pub const SANDBOX_URL: &str = "https://sandbox-invest-public-api.tinkoff.ru/rest";

const CONTRACT: &str = "tinkoff.public.invest.api.contract.v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_WINDOW: Duration = Duration::from_secs(5);

/// Cash is tracked in roubles only.
const CASH_CURRENCY: &str = "rub";

/// What a call does, which decides how its failures are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Order,
    Cancel,
}

/// Map a non-success HTTP status to a market error.
fn map_status(kind: CallKind, status: StatusCode, body: &str) -> MarketError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.message.is_empty() => {
            format!("{} {} ({})", status.as_u16(), err.message, err.code)
        }
        _ => format!("{} {}", status.as_u16(), body),
    };

    match (kind, status) {
        (_, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => MarketError::Unauthorized(detail),
        (CallKind::Order, _) => MarketError::OrderRejected(detail),
        (_, StatusCode::NOT_FOUND) => MarketError::NotFound(detail),
        (_, StatusCode::TOO_MANY_REQUESTS) => MarketError::Unavailable(detail),
        (_, s) if s.is_server_error() => MarketError::Unavailable(detail),
        // Unknown or already-finished orders land here for cancels
        (CallKind::Read | CallKind::Cancel, _) => MarketError::NotFound(detail),
    }
}

/// Map a transport failure. Orders that may not have reached the exchange are
/// still reported as rejected so the caller never assumes they executed.
fn map_transport(kind: CallKind, err: reqwest::Error) -> MarketError {
    match kind {
        CallKind::Order => MarketError::OrderRejected(format!("order not confirmed: {}", err)),
        _ if err.is_decode() => MarketError::Decode(err.to_string()),
        _ => MarketError::Unavailable(err.to_string()),
    }
}

/// Client for the Tinkoff Invest API bound to one brokerage account.
pub struct TinkoffClient {
    http: Client,
    base_url: String,
    token: String,
    account_id: String,
    session: SessionConfig,
}

impl TinkoffClient {
    /// Create a client for the production or sandbox gateway.
    pub fn new(token: &str, account_id: &str, sandbox: bool, session: SessionConfig) -> Result<Self> {
        let base_url = if sandbox { SANDBOX_URL } else { PROD_URL };
        Self::with_base_url(token, account_id, base_url, session)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        token: &str,
        account_id: &str,
        base_url: &str,
        session: SessionConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            account_id: account_id.to_string(),
            session,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn url(&self, service: &str, method: &str) -> String {
        format!("{}/{}.{}/{}", self.base_url, CONTRACT, service, method)
    }

    /// Single attempt at an RPC.
    async fn call<Req, Resp>(
        &self,
        kind: CallKind,
        service: &str,
        method: &str,
        body: &Req,
    ) -> Result<Resp, MarketError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.url(service, method);
        debug!(url = %url, "Calling brokerage");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport(kind, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(kind, status, &text));
        }

        response.json().await.map_err(|e| match kind {
            // The order was accepted; only the confirmation is unreadable
            CallKind::Order => MarketError::OrderRejected(format!("unreadable order response: {}", e)),
            _ => MarketError::Decode(format!("{}/{}: {}", service, method, e)),
        })
    }

    /// Idempotent RPC, retried while the failure looks transient.
    async fn read<Req, Resp>(&self, service: &str, method: &str, body: &Req) -> Result<Resp, MarketError>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(RETRY_WINDOW))
            .build();

        backoff::future::retry(policy, || async move {
            self.call(CallKind::Read, service, method, body)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        warn!(method = %method, error = %e, "Transient brokerage error, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await
    }

    /// Accounts visible to the token.
    pub async fn get_accounts(&self) -> Result<Vec<Account>, MarketError> {
        let resp: AccountsResponse = self
            .read("UsersService", "GetAccounts", &serde_json::json!({}))
            .await?;
        Ok(resp.accounts)
    }

    /// Bind to the first open account when none was configured.
    pub async fn ensure_account(&mut self) -> Result<()> {
        if !self.account_id.is_empty() {
            return Ok(());
        }

        let accounts = self
            .get_accounts()
            .await
            .context("Failed to list brokerage accounts")?;
        let account = accounts
            .into_iter()
            .find(Account::is_open)
            .context("No open brokerage account for this token")?;

        info!(account_id = %account.id, name = %account.name, "Using brokerage account");
        self.account_id = account.id;
        Ok(())
    }

    async fn post_order(
        &self,
        figi: &str,
        lots: u32,
        direction: OrderDirection,
    ) -> Result<OrderId, MarketError> {
        let request = PostOrderRequest {
            figi,
            quantity: lots.to_string(),
            direction: direction_code(direction),
            account_id: &self.account_id,
            order_type: ORDER_TYPE_MARKET,
            order_id: uuid::Uuid::new_v4().to_string(),
        };

        let resp: PostOrderResponse = self
            .call(CallKind::Order, "OrdersService", "PostOrder", &request)
            .await?;

        if resp.is_rejected() {
            return Err(MarketError::OrderRejected(resp.message));
        }

        debug!(
            figi = %figi,
            direction = %direction,
            lots = lots,
            order_id = %resp.order_id,
            status = %resp.execution_report_status,
            "Order accepted"
        );
        Ok(OrderId(resp.order_id))
    }
}

/// Helper to create a client from environment variables.
impl TinkoffClient {
    /// Create from environment variables:
    /// - TINKOFF_TOKEN
    /// - TINKOFF_ACCOUNT_ID (optional, first open account otherwise)
    pub fn from_env(sandbox: bool, session: SessionConfig) -> Result<Self> {
        let token = std::env::var("TINKOFF_TOKEN").context("TINKOFF_TOKEN not set")?;
        let account_id = std::env::var("TINKOFF_ACCOUNT_ID").unwrap_or_default();

        Self::new(&token, &account_id, sandbox, session)
    }
}

#[async_trait]
impl MarketService for TinkoffClient {
    async fn validate_token(&self) -> Result<(), MarketError> {
        let accounts = self.get_accounts().await?;
        if accounts.iter().any(|a| a.id == self.account_id) {
            Ok(())
        } else {
            Err(MarketError::Unauthorized(format!(
                "account {} not accessible with this token",
                self.account_id
            )))
        }
    }

    async fn is_working_hours(&self) -> Result<bool, MarketError> {
        Ok(self.session.is_open(self.now()))
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn get_portfolio(&self) -> Result<Portfolio, MarketError> {
        let portfolio_request = PortfolioRequest {
            account_id: &self.account_id,
            currency: "RUB",
        };
        let positions_request = AccountRequest {
            account_id: &self.account_id,
        };

        let (portfolio, balances): (PortfolioResponse, PositionsResponse) = tokio::try_join!(
            self.read("OperationsService", "GetPortfolio", &portfolio_request),
            self.read("OperationsService", "GetPositions", &positions_request),
        )?;

        let total_shares_value = portfolio.total_shares_value();
        Ok(Portfolio {
            positions: portfolio
                .positions
                .into_iter()
                .map(PortfolioPosition::from)
                .collect(),
            total_shares_value,
            total_cash: balances.cash_in(CASH_CURRENCY),
        })
    }

    async fn get_instrument(&self, figi: &str) -> Result<Instrument, MarketError> {
        let request = InstrumentRequest {
            id_type: "INSTRUMENT_ID_TYPE_FIGI",
            id: figi,
        };
        let resp: ShareResponse = self.read("InstrumentsService", "ShareBy", &request).await?;
        Ok(resp.instrument.into())
    }

    async fn get_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, MarketError> {
        let request = DividendsRequest { figi, from, to };
        let resp: DividendsResponse = self
            .read("InstrumentsService", "GetDividends", &request)
            .await?;

        let mut dividends: Vec<Dividend> = resp
            .dividends
            .into_iter()
            .filter_map(DividendDto::into_dividend)
            .filter(|d| d.last_buy_date >= from && d.last_buy_date <= to)
            .collect();
        sort_by_cutoff(&mut dividends);
        Ok(dividends)
    }

    async fn get_last_price(&self, figi: &str) -> Result<Option<LastPrice>, MarketError> {
        let request = LastPricesRequest { figi: vec![figi] };
        let resp: LastPricesResponse = self
            .read("MarketDataService", "GetLastPrices", &request)
            .await?;

        Ok(resp
            .last_prices
            .into_iter()
            .find(|p| p.figi == figi)
            .and_then(LastPriceDto::into_last_price))
    }

    async fn buy_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        self.post_order(figi, lots, OrderDirection::Buy).await
    }

    async fn sell_market(&self, figi: &str, lots: u32) -> Result<OrderId, MarketError> {
        self.post_order(figi, lots, OrderDirection::Sell).await
    }

    async fn get_orders(&self) -> Result<Vec<OrderState>, MarketError> {
        let request = AccountRequest {
            account_id: &self.account_id,
        };
        let resp: OrdersResponse = self.read("OrdersService", "GetOrders", &request).await?;

        Ok(resp
            .orders
            .into_iter()
            .filter_map(OrderStateDto::into_order_state)
            .collect())
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), MarketError> {
        let request = CancelOrderRequest {
            account_id: &self.account_id,
            order_id: &order_id.0,
        };
        let _: serde_json::Value = self
            .call(CallKind::Cancel, "OrdersService", "CancelOrder", &request)
            .await?;
        Ok(())
    }
}
