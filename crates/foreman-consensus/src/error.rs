use foreman_ledger::LedgerError;
use foreman_pool::PoolError;
use foreman_registry::RegistryError;
use foreman_types::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Consensus engine error types.
///
/// Every error is a rejection of the whole attempted operation: no partial
/// balance or status change survives a failed call.
#[derive(Error, Debug, Clone)]
pub enum ConsensusError {
    #[error("work order not found: {0}")]
    OrderNotFound(u64),

    #[error("caller is not authorized: {0}")]
    Unauthorized(String),

    #[error("invalid state: expected {expected}, actual {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("invalid state transition: from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("deadline exceeded: deadline {deadline}, now {now}")]
    DeadlineExceeded { deadline: i64, now: i64 },

    #[error("deadline not reached: deadline {deadline}, now {now}")]
    DeadlineNotReached { deadline: i64, now: i64 },

    #[error("reveal deadline not reached and not all winners have revealed")]
    DeadlineNotReachedAndNotAllRevealed,

    #[error("cannot finalize: no contribution was revealed")]
    NoReveals,

    #[error("insufficient stake: {0}")]
    InsufficientStake(LedgerError),

    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    #[error("worker {0} is already authorized for this order")]
    AlreadyAuthorized(Address),

    #[error("worker {0} already contributed to this order")]
    AlreadyContributed(Address),

    #[error("no contribution found for worker {0}")]
    ContributionNotFound(Address),

    #[error("order already reached a terminal state")]
    AlreadyTerminal,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
