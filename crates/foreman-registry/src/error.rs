use foreman_types::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry error types.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("unknown asset: {0}")]
    UnknownAsset(Address),

    #[error("unknown category: {0}")]
    UnknownCategory(u64),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
