//! Tinkoff Invest API client for portfolio data and order execution.

mod tinkoff_client;
mod types;

pub use tinkoff_client::TinkoffClient;
