use foreman_types::{Address, Credit};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Stake ledger error types.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// Not enough available balance to debit or lock.
    #[error("insufficient funds for {account}: available {available}, required {required}")]
    InsufficientFunds {
        account: Address,
        available: Credit,
        required: Credit,
    },

    /// A caller asked to release more than is held. This is a caller bug,
    /// not a recoverable condition: the ledger state no longer matches what
    /// the caller believes and processing must not continue.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// Balance arithmetic overflowed.
    #[error("amount overflow for {account}")]
    Overflow { account: Address },

    /// Backend storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}
