use crate::error::{PoolError, Result};
use crate::score::ScoreBoard;
use foreman_ledger::StakeLedger;
use foreman_types::{Address, Credit, Digest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Per-pool economic policy, set by the pool owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPolicy {
    /// Stake locked per contribution, as a percentage of the pool reward.
    pub stake_ratio_pct: u64,
    /// Share of the pool reward kept by the scheduler, 0..=100.
    pub scheduler_reward_ratio_pct: u64,
    /// Minimum available stake a worker needs to subscribe.
    pub subscription_min_stake: Credit,
    /// Minimum score a worker needs to subscribe.
    pub subscription_min_score: u64,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            stake_ratio_pct: 30,
            scheduler_reward_ratio_pct: 1,
            subscription_min_stake: Credit::ZERO,
            subscription_min_score: 0,
        }
    }
}

impl PoolPolicy {
    fn validate(&self) -> Result<()> {
        if self.scheduler_reward_ratio_pct > 100 {
            return Err(PoolError::InvalidPolicy(format!(
                "scheduler reward ratio must be 0..=100, got {}",
                self.scheduler_reward_ratio_pct
            )));
        }
        Ok(())
    }
}

/// A worker pool: one scheduler (the owner), a policy and a worker roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub owner: Address,
    pub description: String,
    pub policy: PoolPolicy,
    pub workers: Vec<Address>,
}

/// Registry of pools and the exclusive worker-to-pool membership map.
pub struct PoolRegistry {
    pools: Arc<RwLock<HashMap<Address, Pool>>>,
    membership: Arc<RwLock<HashMap<Address, Address>>>,
    ledger: Arc<StakeLedger>,
    scores: Arc<ScoreBoard>,
    next_nonce: AtomicU64,
}

impl PoolRegistry {
    pub fn new(ledger: Arc<StakeLedger>, scores: Arc<ScoreBoard>) -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            membership: Arc::new(RwLock::new(HashMap::new())),
            ledger,
            scores,
            next_nonce: AtomicU64::new(1),
        }
    }

    pub async fn create_pool(
        &self,
        owner: Address,
        description: &str,
        policy: PoolPolicy,
    ) -> Result<Address> {
        policy.validate()?;

        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let digest = Digest::of_parts(&[
            b"pool",
            owner.as_bytes(),
            description.as_bytes(),
            &nonce.to_le_bytes(),
        ]);
        let address = Address::from_bytes(*digest.as_bytes());

        let mut pools = self.pools.write().await;
        pools.insert(
            address,
            Pool {
                address,
                owner,
                description: description.to_string(),
                policy: policy.clone(),
                workers: Vec::new(),
            },
        );

        info!(
            pool = %address,
            owner = %owner,
            stake_ratio_pct = policy.stake_ratio_pct,
            scheduler_reward_ratio_pct = policy.scheduler_reward_ratio_pct,
            "🏊 Pool created"
        );
        Ok(address)
    }

    /// Replace a pool's policy. Owner only; existing work orders keep the
    /// values captured at activation.
    pub async fn update_policy(
        &self,
        caller: Address,
        pool: Address,
        policy: PoolPolicy,
    ) -> Result<()> {
        policy.validate()?;

        let mut pools = self.pools.write().await;
        let record = pools.get_mut(&pool).ok_or(PoolError::PoolNotFound(pool))?;
        if record.owner != caller {
            return Err(PoolError::NotPoolOwner { pool, caller });
        }

        record.policy = policy;
        info!(pool = %pool, "🏊 Pool policy updated");
        Ok(())
    }

    /// Subscribe a worker to a pool.
    ///
    /// Membership is exclusive: a worker belongs to at most one pool at a
    /// time. The pool's minimum stake and score gate the subscription but
    /// nothing is locked here.
    pub async fn subscribe(&self, worker: Address, pool: Address) -> Result<()> {
        let mut membership = self.membership.write().await;
        if let Some(current) = membership.get(&worker) {
            return Err(PoolError::AlreadySubscribed {
                worker,
                pool: *current,
            });
        }

        let mut pools = self.pools.write().await;
        let record = pools.get_mut(&pool).ok_or(PoolError::PoolNotFound(pool))?;

        let available = self.ledger.available(worker).await?;
        if available < record.policy.subscription_min_stake {
            return Err(PoolError::InsufficientStake {
                required: record.policy.subscription_min_stake,
                available,
            });
        }

        let score = self.scores.score_of(&worker).await;
        if score < record.policy.subscription_min_score {
            return Err(PoolError::InsufficientScore {
                required: record.policy.subscription_min_score,
                actual: score,
            });
        }

        record.workers.push(worker);
        membership.insert(worker, pool);

        info!(worker = %worker, pool = %pool, "🤝 Worker subscribed");
        Ok(())
    }

    pub async fn unsubscribe(&self, worker: Address) -> Result<()> {
        let mut membership = self.membership.write().await;
        let pool = membership
            .remove(&worker)
            .ok_or(PoolError::NotSubscribed(worker))?;

        let mut pools = self.pools.write().await;
        if let Some(record) = pools.get_mut(&pool) {
            record.workers.retain(|w| *w != worker);
        }

        info!(worker = %worker, pool = %pool, "👋 Worker unsubscribed");
        Ok(())
    }

    pub async fn get(&self, pool: Address) -> Result<Pool> {
        let pools = self.pools.read().await;
        pools.get(&pool).cloned().ok_or(PoolError::PoolNotFound(pool))
    }

    pub async fn pool_of(&self, worker: &Address) -> Option<Address> {
        let membership = self.membership.read().await;
        membership.get(worker).copied()
    }

    pub async fn is_member(&self, pool: Address, worker: &Address) -> bool {
        let membership = self.membership.read().await;
        membership.get(worker) == Some(&pool)
    }
}
