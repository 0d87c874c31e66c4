//! Data models for instruments, positions, dividends, prices, and orders.

mod dividend;
mod instrument;
mod order;
mod position;
mod price;

pub use dividend::{sort_by_cutoff, Dividend};
pub use instrument::{Instrument, SHARE};
pub use order::{OrderDirection, OrderId, OrderIntent, OrderState, OrderStatus};
pub use position::{Portfolio, PortfolioPosition};
pub use price::LastPrice;
