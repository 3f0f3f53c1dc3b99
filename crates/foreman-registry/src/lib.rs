pub mod assets;
pub mod category;
pub mod error;

pub use assets::{AssetKind, AssetRecord, AssetRegistry};
pub use category::{Category, CategoryDirectory};
pub use error::{RegistryError, Result};
