use foreman_ledger::LedgerError;
use foreman_types::{Address, Credit};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

/// Pool policy and roster error types.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("pool not found: {0}")]
    PoolNotFound(Address),

    #[error("caller {caller} is not the owner of pool {pool}")]
    NotPoolOwner { pool: Address, caller: Address },

    #[error("worker {worker} is already subscribed to pool {pool}")]
    AlreadySubscribed { worker: Address, pool: Address },

    #[error("worker {0} is not subscribed to any pool")]
    NotSubscribed(Address),

    #[error("subscription stake too low: required {required}, available {available}")]
    InsufficientStake {
        required: Credit,
        available: Credit,
    },

    #[error("subscription score too low: required {required}, actual {actual}")]
    InsufficientScore { required: u64, actual: u64 },

    #[error("invalid pool policy: {0}")]
    InvalidPolicy(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
