pub mod error;
pub mod pool;
pub mod score;

pub use error::{PoolError, Result};
pub use pool::{Pool, PoolPolicy, PoolRegistry};
pub use score::ScoreBoard;
