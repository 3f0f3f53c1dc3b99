use crate::error::Result;
use async_trait::async_trait;
use foreman_types::{Address, Credit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type BalanceMap = HashMap<Address, Credit>;

/// Backend storage for per-account available and locked balances.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    async fn available(&self, account: Address) -> Result<Credit>;
    async fn set_available(&self, account: Address, amount: Credit) -> Result<()>;
    async fn locked(&self, account: Address) -> Result<Credit>;
    async fn set_locked(&self, account: Address, amount: Credit) -> Result<()>;
    async fn accounts(&self) -> Result<Vec<Address>>;
}

/// In-memory ledger storage.
pub struct MemoryLedgerStorage {
    available: Arc<RwLock<BalanceMap>>,
    locked: Arc<RwLock<BalanceMap>>,
}

impl Default for MemoryLedgerStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStorage {
    pub fn new() -> Self {
        Self {
            available: Arc::new(RwLock::new(HashMap::new())),
            locked: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl LedgerStorage for MemoryLedgerStorage {
    async fn available(&self, account: Address) -> Result<Credit> {
        let available = self.available.read().await;
        Ok(available.get(&account).copied().unwrap_or(Credit::ZERO))
    }

    async fn set_available(&self, account: Address, amount: Credit) -> Result<()> {
        let mut available = self.available.write().await;
        if amount.is_zero() {
            available.remove(&account);
        } else {
            available.insert(account, amount);
        }
        Ok(())
    }

    async fn locked(&self, account: Address) -> Result<Credit> {
        let locked = self.locked.read().await;
        Ok(locked.get(&account).copied().unwrap_or(Credit::ZERO))
    }

    async fn set_locked(&self, account: Address, amount: Credit) -> Result<()> {
        let mut locked = self.locked.write().await;
        if amount.is_zero() {
            locked.remove(&account);
        } else {
            locked.insert(account, amount);
        }
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        let available = self.available.read().await;
        let locked = self.locked.read().await;

        let mut accounts: Vec<Address> = available.keys().copied().collect();
        for addr in locked.keys() {
            if !available.contains_key(addr) {
                accounts.push(*addr);
            }
        }

        Ok(accounts)
    }
}
