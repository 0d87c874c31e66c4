//! Trading logic: dividend-cycle planning, ledger, engine.

mod config;
mod engine;
mod error;
mod ledger;
mod planner;
mod report;

pub use config::{parse_target, EngineConfig};
pub use engine::DividendEngine;
pub use error::CycleError;
pub use planner::{classify, InstrumentState};
pub use report::{CycleMode, CycleReport};
