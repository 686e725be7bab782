use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub(crate) enum LedgerError {
    #[error("balance {balance} is less than the required {required}")]
    InsufficientFunds { required: u64, balance: u64 },
}

/// Per-table point balances for one bar session. Only ever mutated from the
/// bar's owner worker, so a debit and the admission it pays for cannot
/// interleave with other mutations.
#[derive(Debug, Default)]
pub(crate) struct PointsLedger {
    balances: HashMap<String, u64>,
}

impl PointsLedger {
    pub(crate) fn balance(&self, table_id: &str) -> u64 {
        self.balances.get(table_id).copied().unwrap_or(0)
    }

    /// Removes `amount` points from the table, failing without any change
    /// when the balance cannot cover it. Returns the new balance.
    pub(crate) fn debit(&mut self, table_id: &str, amount: u64) -> Result<u64, LedgerError> {
        let balance = self.balance(table_id);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                required: amount,
                balance,
            })?;
        self.balances.insert(table_id.to_owned(), remaining);
        debug!("debited {amount} points from table {table_id}, {remaining} remaining");
        Ok(remaining)
    }

    /// Adds `amount` points to the table and returns the new balance.
    pub(crate) fn credit(&mut self, table_id: &str, amount: u64) -> u64 {
        let balance = self
            .balances
            .entry(table_id.to_owned())
            .or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!("credited {amount} points to table {table_id}, balance now {balance}");
        *balance
    }
}

#[cfg(test)]
#[path = "./ledger_test.rs"]
mod ledger_test;
