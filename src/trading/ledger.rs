//! Per-cycle record of submitted orders.
//!
//! Contract: an instrument/direction pair is recorded before its order is
//! submitted, and at most once per cycle.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::OrderDirection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Duplicate {direction} for {figi} this cycle ({recorded_lots} lots already recorded)")]
    DuplicateAction {
        figi: String,
        direction: OrderDirection,
        recorded_lots: u32,
    },
}

#[derive(Debug, Default)]
pub struct ReconciliationLedger {
    entries: BTreeMap<(String, OrderDirection), u32>,
}

impl ReconciliationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order about to be submitted. Fails if the same instrument and
    /// direction were already recorded this cycle; the first record stands.
    pub fn record_intent(
        &mut self,
        figi: &str,
        direction: OrderDirection,
        lots: u32,
    ) -> Result<(), LedgerError> {
        let key = (figi.to_string(), direction);
        if let Some(recorded_lots) = self.entries.get(&key) {
            return Err(LedgerError::DuplicateAction {
                figi: figi.to_string(),
                direction,
                recorded_lots: *recorded_lots,
            });
        }
        self.entries.insert(key, lots);
        Ok(())
    }

    /// Discard every record. Called at the start of each cycle.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn lots_for(&self, figi: &str, direction: OrderDirection) -> Option<u32> {
        self.entries.get(&(figi.to_string(), direction)).copied()
    }

    /// Recorded actions, ordered by FIGI then direction.
    pub fn entries(&self) -> impl Iterator<Item = (&str, OrderDirection, u32)> {
        self.entries
            .iter()
            .map(|((figi, direction), lots)| (figi.as_str(), *direction, *lots))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
