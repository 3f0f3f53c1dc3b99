use crate::error::{LedgerError, Result};
use crate::storage::LedgerStorage;
use foreman_types::{Address, Credit};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// The stake ledger: per-account available/locked balances plus the per-pool
/// jackpot accounts fed by seized stakes.
///
/// Every mutation is all-or-nothing; compound read-modify-write sequences are
/// serialized under an internal gate so no partial transfer is ever observed.
pub struct StakeLedger {
    storage: Arc<dyn LedgerStorage>,
    jackpots: Arc<RwLock<HashMap<Address, Credit>>>,
    gate: Mutex<()>,
}

impl StakeLedger {
    pub fn new(storage: Arc<dyn LedgerStorage>) -> Self {
        Self {
            storage,
            jackpots: Arc::new(RwLock::new(HashMap::new())),
            gate: Mutex::new(()),
        }
    }

    /// Credit an account's available balance from the external token escrow.
    pub async fn deposit(&self, account: Address, amount: Credit) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;

        let available = self.storage.available(account).await?;
        let new_available = available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account })?;
        self.storage.set_available(account, new_available).await?;

        info!(
            account = %account,
            amount = %amount,
            available_after = %new_available,
            "💰 Deposit credited"
        );
        Ok(())
    }

    /// Debit an account's available balance back to the external token escrow.
    pub async fn withdraw(&self, account: Address, amount: Credit) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;

        let available = self.storage.available(account).await?;
        let new_available =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientFunds {
                    account,
                    available,
                    required: amount,
                })?;
        self.storage.set_available(account, new_available).await?;

        info!(
            account = %account,
            amount = %amount,
            available_after = %new_available,
            "💸 Withdrawal debited"
        );
        Ok(())
    }

    /// Move `amount` from available to locked.
    pub async fn lock(&self, account: Address, amount: Credit) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.lock_inner(account, amount).await
    }

    async fn lock_inner(&self, account: Address, amount: Credit) -> Result<()> {
        let available = self.storage.available(account).await?;
        let locked = self.storage.locked(account).await?;

        let new_available =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientFunds {
                    account,
                    available,
                    required: amount,
                })?;
        let new_locked = locked
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account })?;

        self.storage.set_available(account, new_available).await?;
        self.storage.set_locked(account, new_locked).await?;

        info!(
            account = %account,
            amount = %amount,
            locked_after = %new_locked,
            "🔒 Stake locked"
        );
        Ok(())
    }

    /// Move `amount` from locked back to available.
    ///
    /// A shortfall here means a caller released stake it never locked; the
    /// ledger refuses and reports the invariant violation.
    pub async fn unlock(&self, account: Address, amount: Credit) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.unlock_inner(account, amount).await
    }

    async fn unlock_inner(&self, account: Address, amount: Credit) -> Result<()> {
        let available = self.storage.available(account).await?;
        let locked = self.storage.locked(account).await?;

        let new_locked = locked.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "unlock of {} exceeds locked balance {} for {}",
                amount, locked, account
            ))
        })?;
        let new_available = available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account })?;

        self.storage.set_available(account, new_available).await?;
        self.storage.set_locked(account, new_locked).await?;

        info!(
            account = %account,
            amount = %amount,
            locked_after = %new_locked,
            "🔓 Stake unlocked"
        );
        Ok(())
    }

    /// Atomic seize-and-pay: debit `from`'s locked balance, credit `to`'s
    /// available balance.
    pub async fn reward(&self, from: Address, to: Address, amount: Credit) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;

        let from_locked = self.storage.locked(from).await?;
        let new_from_locked = from_locked.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "reward of {} exceeds locked balance {} for {}",
                amount, from_locked, from
            ))
        })?;

        let to_available = self.storage.available(to).await?;
        let new_to_available = to_available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: to })?;

        self.storage.set_locked(from, new_from_locked).await?;
        self.storage.set_available(to, new_to_available).await?;

        info!(
            from = %from,
            to = %to,
            amount = %amount,
            "💸 Reward paid from locked stake"
        );
        Ok(())
    }

    /// Forfeit `amount` of `account`'s locked stake into `pool`'s jackpot.
    pub async fn seize_to_jackpot(
        &self,
        account: Address,
        pool: Address,
        amount: Credit,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;

        let locked = self.storage.locked(account).await?;
        let new_locked = locked.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "seizure of {} exceeds locked balance {} for {}",
                amount, locked, account
            ))
        })?;
        self.storage.set_locked(account, new_locked).await?;

        let mut jackpots = self.jackpots.write().await;
        let jackpot = jackpots.entry(pool).or_insert(Credit::ZERO);
        *jackpot = jackpot.saturating_add(amount);

        warn!(
            account = %account,
            pool = %pool,
            amount = %amount,
            jackpot_after = %*jackpot,
            "⚔️ Stake seized into jackpot"
        );
        Ok(())
    }

    /// Pay `amount` out of `pool`'s jackpot into `to`'s available balance.
    pub async fn drain_jackpot(&self, pool: Address, to: Address, amount: Credit) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;

        let mut jackpots = self.jackpots.write().await;
        let jackpot = jackpots.get(&pool).copied().unwrap_or(Credit::ZERO);
        let new_jackpot = jackpot.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "jackpot drain of {} exceeds jackpot {} for pool {}",
                amount, jackpot, pool
            ))
        })?;

        let to_available = self.storage.available(to).await?;
        let new_to_available = to_available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: to })?;

        if new_jackpot.is_zero() {
            jackpots.remove(&pool);
        } else {
            jackpots.insert(pool, new_jackpot);
        }
        self.storage.set_available(to, new_to_available).await?;

        info!(
            pool = %pool,
            to = %to,
            amount = %amount,
            jackpot_after = %new_jackpot,
            "🎰 Jackpot grant paid"
        );
        Ok(())
    }

    pub async fn available(&self, account: Address) -> Result<Credit> {
        self.storage.available(account).await
    }

    pub async fn locked(&self, account: Address) -> Result<Credit> {
        self.storage.locked(account).await
    }

    pub async fn jackpot(&self, pool: Address) -> Credit {
        let jackpots = self.jackpots.read().await;
        jackpots.get(&pool).copied().unwrap_or(Credit::ZERO)
    }

    /// Total value held by the ledger: all available and locked balances plus
    /// all jackpots. Invariant under every operation except deposit/withdraw.
    pub async fn total_supply(&self) -> Result<Credit> {
        let mut total = Credit::ZERO;
        for account in self.storage.accounts().await? {
            total = total.saturating_add(self.storage.available(account).await?);
            total = total.saturating_add(self.storage.locked(account).await?);
        }
        let jackpots = self.jackpots.read().await;
        for jackpot in jackpots.values() {
            total = total.saturating_add(*jackpot);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLedgerStorage;

    fn ledger() -> StakeLedger {
        StakeLedger::new(Arc::new(MemoryLedgerStorage::new()))
    }

    #[tokio::test]
    async fn test_deposit_withdraw() {
        let ledger = ledger();
        let addr = Address::from_bytes([1; 32]);

        ledger.deposit(addr, Credit::from_credits(100)).await.unwrap();
        assert_eq!(
            ledger.available(addr).await.unwrap(),
            Credit::from_credits(100)
        );

        ledger.withdraw(addr, Credit::from_credits(40)).await.unwrap();
        assert_eq!(
            ledger.available(addr).await.unwrap(),
            Credit::from_credits(60)
        );

        let err = ledger
            .withdraw(addr, Credit::from_credits(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_lock_unlock() {
        let ledger = ledger();
        let addr = Address::from_bytes([2; 32]);

        ledger.deposit(addr, Credit::from_credits(100)).await.unwrap();
        ledger.lock(addr, Credit::from_credits(40)).await.unwrap();

        assert_eq!(
            ledger.available(addr).await.unwrap(),
            Credit::from_credits(60)
        );
        assert_eq!(ledger.locked(addr).await.unwrap(), Credit::from_credits(40));

        // Cannot lock more than available.
        let err = ledger.lock(addr, Credit::from_credits(70)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        ledger.unlock(addr, Credit::from_credits(40)).await.unwrap();
        assert_eq!(ledger.locked(addr).await.unwrap(), Credit::ZERO);
    }

    #[tokio::test]
    async fn test_unlock_beyond_locked_is_invariant_violation() {
        let ledger = ledger();
        let addr = Address::from_bytes([3; 32]);

        ledger.deposit(addr, Credit::from_credits(10)).await.unwrap();
        ledger.lock(addr, Credit::from_credits(5)).await.unwrap();

        let err = ledger
            .unlock(addr, Credit::from_credits(6))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));

        // Balances untouched by the rejected operation.
        assert_eq!(ledger.locked(addr).await.unwrap(), Credit::from_credits(5));
        assert_eq!(
            ledger.available(addr).await.unwrap(),
            Credit::from_credits(5)
        );
    }

    #[tokio::test]
    async fn test_reward_moves_locked_to_available() {
        let ledger = ledger();
        let from = Address::from_bytes([4; 32]);
        let to = Address::from_bytes([5; 32]);

        ledger.deposit(from, Credit::from_credits(50)).await.unwrap();
        ledger.lock(from, Credit::from_credits(30)).await.unwrap();
        ledger
            .reward(from, to, Credit::from_credits(30))
            .await
            .unwrap();

        assert_eq!(ledger.locked(from).await.unwrap(), Credit::ZERO);
        assert_eq!(
            ledger.available(to).await.unwrap(),
            Credit::from_credits(30)
        );
    }

    #[tokio::test]
    async fn test_jackpot_seize_and_drain() {
        let ledger = ledger();
        let worker = Address::from_bytes([6; 32]);
        let scheduler = Address::from_bytes([7; 32]);
        let pool = Address::from_bytes([8; 32]);

        ledger
            .deposit(worker, Credit::from_credits(20))
            .await
            .unwrap();
        ledger.lock(worker, Credit::from_credits(20)).await.unwrap();
        ledger
            .seize_to_jackpot(worker, pool, Credit::from_credits(20))
            .await
            .unwrap();

        assert_eq!(ledger.jackpot(pool).await, Credit::from_credits(20));
        assert_eq!(ledger.locked(worker).await.unwrap(), Credit::ZERO);

        ledger
            .drain_jackpot(pool, scheduler, Credit::from_credits(2))
            .await
            .unwrap();
        assert_eq!(ledger.jackpot(pool).await, Credit::from_credits(18));
        assert_eq!(
            ledger.available(scheduler).await.unwrap(),
            Credit::from_credits(2)
        );

        let err = ledger
            .drain_jackpot(pool, scheduler, Credit::from_credits(100))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_total_supply_tracks_all_holdings() {
        let ledger = ledger();
        let a = Address::from_bytes([9; 32]);
        let b = Address::from_bytes([10; 32]);
        let pool = Address::from_bytes([11; 32]);

        ledger.deposit(a, Credit::from_credits(100)).await.unwrap();
        ledger.deposit(b, Credit::from_credits(50)).await.unwrap();
        assert_eq!(
            ledger.total_supply().await.unwrap(),
            Credit::from_credits(150)
        );

        ledger.lock(a, Credit::from_credits(60)).await.unwrap();
        ledger
            .seize_to_jackpot(a, pool, Credit::from_credits(60))
            .await
            .unwrap();
        ledger.reward(b, a, Credit::ZERO).await.unwrap();

        // Locks, seizures and zero transfers never change the total.
        assert_eq!(
            ledger.total_supply().await.unwrap(),
            Credit::from_credits(150)
        );
    }
}
