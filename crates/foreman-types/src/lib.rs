pub mod address;
pub mod amount;
pub mod digest;
pub mod lifecycle;

pub use address::Address;
pub use amount::{Credit, CREDIT_BASE_UNIT, CREDIT_DECIMALS};
pub use digest::Digest;
pub use lifecycle::Lifecycle;
