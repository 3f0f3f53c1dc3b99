pub mod error;
pub mod ledger;
pub mod storage;

pub use error::{LedgerError, Result};
pub use ledger::StakeLedger;
pub use storage::{LedgerStorage, MemoryLedgerStorage};
