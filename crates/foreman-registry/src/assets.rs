use crate::error::{RegistryError, Result};
use foreman_types::{Address, Credit, Digest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Kinds of marketplace assets a work order can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    App,
    Dataset,
}

/// An ownership and pricing record for an app or dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub kind: AssetKind,
    pub owner: Address,
    pub name: String,
    pub price: Credit,
}

/// Read-mostly registry of apps and datasets.
///
/// The consensus core only needs `owner_of` and `price_of`; registration
/// exists so providers can be set up for a pool without an external system.
pub struct AssetRegistry {
    assets: Arc<RwLock<HashMap<Address, AssetRecord>>>,
    next_nonce: AtomicU64,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(RwLock::new(HashMap::new())),
            next_nonce: AtomicU64::new(1),
        }
    }

    pub async fn register_app(&self, owner: Address, name: &str, price: Credit) -> Address {
        self.register(AssetKind::App, owner, name, price).await
    }

    pub async fn register_dataset(&self, owner: Address, name: &str, price: Credit) -> Address {
        self.register(AssetKind::Dataset, owner, name, price).await
    }

    async fn register(
        &self,
        kind: AssetKind,
        owner: Address,
        name: &str,
        price: Credit,
    ) -> Address {
        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let tag: &[u8] = match kind {
            AssetKind::App => b"app",
            AssetKind::Dataset => b"dataset",
        };
        let digest = Digest::of_parts(&[
            tag,
            owner.as_bytes(),
            name.as_bytes(),
            &nonce.to_le_bytes(),
        ]);
        let address = Address::from_bytes(*digest.as_bytes());

        let mut assets = self.assets.write().await;
        assets.insert(
            address,
            AssetRecord {
                kind,
                owner,
                name: name.to_string(),
                price,
            },
        );

        info!(
            asset = %address,
            owner = %owner,
            kind = ?kind,
            name = name,
            price = %price,
            "📦 Asset registered"
        );
        address
    }

    pub async fn get(&self, asset: Address) -> Result<AssetRecord> {
        let assets = self.assets.read().await;
        assets
            .get(&asset)
            .cloned()
            .ok_or(RegistryError::UnknownAsset(asset))
    }

    pub async fn owner_of(&self, asset: Address) -> Result<Address> {
        Ok(self.get(asset).await?.owner)
    }

    pub async fn price_of(&self, asset: Address) -> Result<Credit> {
        Ok(self.get(asset).await?.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = AssetRegistry::new();
        let owner = Address::from_bytes([1; 32]);

        let app = registry
            .register_app(owner, "matrix-mult", Credit::from_credits(3))
            .await;
        assert_eq!(registry.owner_of(app).await.unwrap(), owner);
        assert_eq!(
            registry.price_of(app).await.unwrap(),
            Credit::from_credits(3)
        );
        assert_eq!(registry.get(app).await.unwrap().kind, AssetKind::App);
    }

    #[tokio::test]
    async fn test_addresses_are_unique() {
        let registry = AssetRegistry::new();
        let owner = Address::from_bytes([2; 32]);

        let a = registry.register_app(owner, "same", Credit::ZERO).await;
        let b = registry.register_app(owner, "same", Credit::ZERO).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_asset() {
        let registry = AssetRegistry::new();
        let missing = Address::from_bytes([9; 32]);
        assert!(matches!(
            registry.owner_of(missing).await,
            Err(RegistryError::UnknownAsset(_))
        ));
    }
}
