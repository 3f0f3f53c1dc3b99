use crate::config::ProtocolConfig;
use crate::contribution::{Contribution, ContributionStatus};
use crate::error::{ConsensusError, Result};
use crate::events::ProtocolEvent;
use crate::order::{ConsensusDetails, OrderStatus, ResultMetadata, WorkOrder};
use chrono::Utc;
use foreman_ledger::{LedgerError, StakeLedger};
use foreman_pool::{PoolRegistry, ScoreBoard};
use foreman_registry::{AssetRegistry, CategoryDirectory, RegistryError};
use foreman_types::{Address, Credit, Digest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

/// Activation parameters supplied by the external marketplace once a bid/ask
/// match is confirmed.
#[derive(Debug, Clone)]
pub struct WorkOrderRequest {
    pub pool: Address,
    pub app: Address,
    /// Zero address if the order uses no dataset.
    pub dataset: Address,
    pub category: u64,
    pub trust: u64,
    pub requester: Address,
    pub app_price: Credit,
    pub dataset_price: Credit,
    pub pool_reward: Credit,
}

struct OrderEntry {
    order: WorkOrder,
    contributions: Vec<Contribution>,
}

/// One worker's share of a finalization settlement.
struct Payout {
    index: usize,
    worker: Address,
    score: u64,
    weight: u64,
    reward: Credit,
}

/// The Proof-of-Contribution consensus engine.
///
/// Drives work orders through authorize / contribute / reveal / finalize,
/// mutating the stake ledger, and through the claim path when a consensus
/// stalls past its timeout. Deadline-sensitive operations take `now` (Unix
/// seconds) explicitly so timing windows stay deterministic under test.
pub struct ConsensusEngine {
    config: ProtocolConfig,
    ledger: Arc<StakeLedger>,
    pools: Arc<PoolRegistry>,
    scores: Arc<ScoreBoard>,
    assets: Arc<AssetRegistry>,
    categories: Arc<CategoryDirectory>,
    orders: Arc<RwLock<HashMap<u64, OrderEntry>>>,
    next_order_id: AtomicU64,
    events: Option<mpsc::UnboundedSender<ProtocolEvent>>,
}

impl ConsensusEngine {
    pub fn new(
        config: ProtocolConfig,
        ledger: Arc<StakeLedger>,
        pools: Arc<PoolRegistry>,
        scores: Arc<ScoreBoard>,
        assets: Arc<AssetRegistry>,
        categories: Arc<CategoryDirectory>,
    ) -> Self {
        Self {
            config,
            ledger,
            pools,
            scores,
            assets,
            categories,
            orders: Arc::new(RwLock::new(HashMap::new())),
            next_order_id: AtomicU64::new(1),
            events: None,
        }
    }

    /// Create an engine that emits protocol events on the returned channel.
    pub fn with_events(
        config: ProtocolConfig,
        ledger: Arc<StakeLedger>,
        pools: Arc<PoolRegistry>,
        scores: Arc<ScoreBoard>,
        assets: Arc<AssetRegistry>,
        categories: Arc<CategoryDirectory>,
    ) -> (Self, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = Self::new(config, ledger, pools, scores, assets, categories);
        engine.events = Some(tx);
        (engine, rx)
    }

    fn emit(&self, event: ProtocolEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                warn!("Protocol event receiver dropped");
            }
        }
    }

    /// Activate a work order from a confirmed marketplace match.
    ///
    /// Locks the scheduler's stake and the requester's full payment, and
    /// fixes the consensus timeout from the category time unit.
    pub async fn activate(&self, request: WorkOrderRequest, now: i64) -> Result<u64> {
        let pool = self.pools.get(request.pool).await?;
        let time_unit = self.categories.time_unit(request.category).await?;

        self.assets.get(request.app).await?;
        if request.dataset.is_zero() {
            if !request.dataset_price.is_zero() {
                return Err(ConsensusError::Registry(RegistryError::InvalidParameter(
                    "dataset price without a dataset".to_string(),
                )));
            }
        } else {
            self.assets.get(request.dataset).await?;
        }

        let stake = request.pool_reward.percent(pool.policy.stake_ratio_pct);
        let payment = request
            .pool_reward
            .checked_add(request.app_price)
            .and_then(|p| p.checked_add(request.dataset_price))
            .ok_or(ConsensusError::Ledger(LedgerError::Overflow {
                account: request.requester,
            }))?;

        self.ledger
            .lock(pool.owner, stake)
            .await
            .map_err(insufficient_stake)?;
        if let Err(e) = self.ledger.lock(request.requester, payment).await {
            // Undo the scheduler lock so the rejection leaves no trace.
            self.ledger.unlock(pool.owner, stake).await?;
            return Err(insufficient_stake(e));
        }

        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let order = WorkOrder {
            id,
            pool: request.pool,
            scheduler: pool.owner,
            app: request.app,
            dataset: request.dataset,
            category: request.category,
            trust: request.trust,
            requester: request.requester,
            app_price: request.app_price,
            dataset_price: request.dataset_price,
            pool_reward: request.pool_reward,
            scheduler_reward_ratio_pct: pool.policy.scheduler_reward_ratio_pct,
            activated_at: now,
            status: OrderStatus::Active,
            consensus: ConsensusDetails {
                required_stake_per_worker: stake,
                consensus_hash: None,
                reveal_date: 0,
                consensus_deadline: 0,
                consensus_timeout: now + self.config.consensus_duration_ratio * time_unit,
                reveal_counter: 0,
                winner_count: 0,
            },
            result: None,
        };

        let mut orders = self.orders.write().await;
        orders.insert(
            id,
            OrderEntry {
                order,
                contributions: Vec::new(),
            },
        );

        info!(
            order_id = id,
            pool = %request.pool,
            requester = %request.requester,
            pool_reward = %request.pool_reward,
            stake = %stake,
            "🚀 Work order activated"
        );
        self.emit(ProtocolEvent::OrderActivated {
            order_id: id,
            pool: request.pool,
            requester: request.requester,
            pool_reward: request.pool_reward,
            timestamp: Utc::now(),
        });

        Ok(id)
    }

    /// Authorize a pool worker to contribute to an active order.
    ///
    /// Scheduler only. An optional enclave challenge digest commits the
    /// worker to a trusted-execution attestation at contribution time.
    pub async fn authorize(
        &self,
        caller: Address,
        order_id: u64,
        worker: Address,
        enclave_challenge: Option<Digest>,
    ) -> Result<()> {
        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        require_status(&entry.order, OrderStatus::Active)?;
        if caller != entry.order.scheduler {
            return Err(ConsensusError::Unauthorized(format!(
                "{} is not the scheduler of order {}",
                caller, order_id
            )));
        }
        if !self.pools.is_member(entry.order.pool, &worker).await {
            return Err(ConsensusError::Unauthorized(format!(
                "worker {} is not subscribed to pool {}",
                worker, entry.order.pool
            )));
        }
        if entry.contributions.iter().any(|c| c.worker == worker) {
            return Err(ConsensusError::AlreadyAuthorized(worker));
        }

        entry
            .contributions
            .push(Contribution::authorized(worker, enclave_challenge));

        info!(order_id, worker = %worker, "✅ Worker authorized");
        self.emit(ProtocolEvent::WorkerAuthorized {
            order_id,
            worker,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Commit a result hash for an active order, locking the worker's stake.
    pub async fn contribute(
        &self,
        worker: Address,
        order_id: u64,
        result_hash: Digest,
        result_sign: Digest,
        enclave_sign: Option<Digest>,
        now: i64,
    ) -> Result<()> {
        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        require_status(&entry.order, OrderStatus::Active)?;
        let timeout = entry.order.consensus.consensus_timeout;
        if now > timeout {
            return Err(ConsensusError::DeadlineExceeded {
                deadline: timeout,
                now,
            });
        }

        let stake = entry.order.consensus.required_stake_per_worker;
        let contribution = entry
            .contributions
            .iter_mut()
            .find(|c| c.worker == worker)
            .ok_or_else(|| {
                ConsensusError::Unauthorized(format!(
                    "worker {} was never authorized for order {}",
                    worker, order_id
                ))
            })?;

        match contribution.status {
            ContributionStatus::Authorized => {}
            ContributionStatus::Contributed | ContributionStatus::Proved => {
                return Err(ConsensusError::AlreadyContributed(worker));
            }
            other => {
                return Err(ConsensusError::InvalidState {
                    expected: "Authorized".to_string(),
                    actual: format!("{:?}", other),
                });
            }
        }

        if result_hash.is_zero() || result_sign.is_zero() {
            return Err(ConsensusError::HashMismatch(
                "result hash and sign must be non-zero".to_string(),
            ));
        }
        if let Some(challenge) = contribution.enclave_challenge {
            let expected = Digest::of_parts(&[
                challenge.as_bytes(),
                result_hash.as_bytes(),
                result_sign.as_bytes(),
            ]);
            if enclave_sign != Some(expected) {
                return Err(ConsensusError::HashMismatch(
                    "enclave attestation does not match the challenge".to_string(),
                ));
            }
        }

        self.ledger
            .lock(worker, stake)
            .await
            .map_err(insufficient_stake)?;

        contribution.status = ContributionStatus::Contributed;
        contribution.result_hash = result_hash;
        contribution.result_sign = result_sign;

        info!(
            order_id,
            worker = %worker,
            result_hash = %result_hash,
            stake = %stake,
            "📝 Contribution committed"
        );
        self.emit(ProtocolEvent::ContributionMade {
            order_id,
            worker,
            result_hash,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Declare the consensus hash and open the reveal window.
    ///
    /// Scheduler only, once, while the order is active; at least one
    /// committed contribution must match the proposed hash.
    pub async fn reveal_consensus(
        &self,
        caller: Address,
        order_id: u64,
        proposed: Digest,
        now: i64,
    ) -> Result<()> {
        let time_unit = {
            let orders = self.orders.read().await;
            let entry = orders
                .get(&order_id)
                .ok_or(ConsensusError::OrderNotFound(order_id))?;
            self.categories.time_unit(entry.order.category).await?
        };

        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        require_status(&entry.order, OrderStatus::Active)?;
        if caller != entry.order.scheduler {
            return Err(ConsensusError::Unauthorized(format!(
                "{} is not the scheduler of order {}",
                caller, order_id
            )));
        }

        let winner_count = entry
            .contributions
            .iter()
            .filter(|c| c.status == ContributionStatus::Contributed && c.result_hash == proposed)
            .count() as u32;
        if winner_count == 0 {
            return Err(ConsensusError::HashMismatch(
                "no committed contribution matches the proposed consensus".to_string(),
            ));
        }

        entry.order.transition_to(OrderStatus::Revealing)?;
        entry.order.consensus.consensus_hash = Some(proposed);
        entry.order.consensus.reveal_date = now;
        entry.order.consensus.consensus_deadline =
            now + self.config.reveal_period_duration_ratio * time_unit;
        entry.order.consensus.winner_count = winner_count;

        info!(
            order_id,
            consensus_hash = %proposed,
            winner_count,
            reveal_deadline = entry.order.consensus.consensus_deadline,
            "🗳️ Consensus revealed"
        );
        self.emit(ProtocolEvent::ConsensusRevealed {
            order_id,
            consensus_hash: proposed,
            winner_count,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Reveal the preimage behind a committed result hash.
    ///
    /// The preimage must hash to the worker's own commit, the commit must
    /// equal the declared consensus, and the stored sign must re-derive from
    /// the preimage and the worker address.
    pub async fn reveal(
        &self,
        worker: Address,
        order_id: u64,
        preimage: &[u8],
        now: i64,
    ) -> Result<()> {
        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        require_status(&entry.order, OrderStatus::Revealing)?;
        let deadline = entry.order.consensus.consensus_deadline;
        if now > deadline {
            return Err(ConsensusError::DeadlineExceeded { deadline, now });
        }

        let consensus_hash = match entry.order.consensus.consensus_hash {
            Some(hash) => hash,
            None => {
                return Err(ConsensusError::InvalidState {
                    expected: "Revealing with a declared consensus".to_string(),
                    actual: "Revealing without a consensus hash".to_string(),
                })
            }
        };

        let contribution = entry
            .contributions
            .iter_mut()
            .find(|c| c.worker == worker)
            .ok_or(ConsensusError::ContributionNotFound(worker))?;

        match contribution.status {
            ContributionStatus::Contributed => {}
            ContributionStatus::Proved => {
                return Err(ConsensusError::AlreadyContributed(worker));
            }
            other => {
                return Err(ConsensusError::InvalidState {
                    expected: "Contributed".to_string(),
                    actual: format!("{:?}", other),
                });
            }
        }

        if Digest::of(preimage) != contribution.result_hash
            || contribution.result_hash != consensus_hash
        {
            return Err(ConsensusError::HashMismatch(
                "preimage does not match the declared consensus".to_string(),
            ));
        }
        if Digest::bind(preimage, &worker) != contribution.result_sign {
            return Err(ConsensusError::HashMismatch(
                "result sign does not bind the worker to the preimage".to_string(),
            ));
        }

        contribution.status = ContributionStatus::Proved;
        entry.order.consensus.reveal_counter += 1;
        let score = self.scores.increment(&worker).await;

        info!(
            order_id,
            worker = %worker,
            score,
            reveal_counter = entry.order.consensus.reveal_counter,
            "🔎 Contribution proved"
        );
        self.emit(ProtocolEvent::WorkerRevealed {
            order_id,
            worker,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Finalize a revealed order: reward proved workers by score weight,
    /// seize faulty stakes into the pool jackpot, settle the scheduler and
    /// the app/dataset providers, and complete the order.
    pub async fn finalize(
        &self,
        caller: Address,
        order_id: u64,
        stdout: String,
        stderr: String,
        result_uri: String,
        now: i64,
    ) -> Result<()> {
        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        require_status(&entry.order, OrderStatus::Revealing)?;
        if caller != entry.order.scheduler {
            return Err(ConsensusError::Unauthorized(format!(
                "{} is not the scheduler of order {}",
                caller, order_id
            )));
        }

        let consensus = &entry.order.consensus;
        if consensus.reveal_counter == 0 {
            return Err(ConsensusError::NoReveals);
        }
        if consensus.reveal_counter < consensus.winner_count && now <= consensus.consensus_deadline
        {
            return Err(ConsensusError::DeadlineNotReachedAndNotAllRevealed);
        }

        // Plan the whole settlement before touching the ledger, so any
        // rejection (e.g. an unregistered provider) leaves no trace.
        let order = &entry.order;
        let pool = order.pool;
        let scheduler = order.scheduler;
        let requester = order.requester;
        let stake = consensus.required_stake_per_worker;

        let app_owner = self.assets.owner_of(order.app).await?;
        let dataset_owner = if order.dataset.is_zero() {
            None
        } else {
            Some(self.assets.owner_of(order.dataset).await?)
        };

        let workers_reward = order
            .pool_reward
            .percent(100 - order.scheduler_reward_ratio_pct);

        let mut payouts: Vec<Payout> = Vec::new();
        let mut forfeits: Vec<(usize, Address)> = Vec::new();
        let mut silent: Vec<usize> = Vec::new();
        for (index, contribution) in entry.contributions.iter().enumerate() {
            match contribution.status {
                ContributionStatus::Proved => {
                    let score = self.scores.score_of(&contribution.worker).await;
                    let weight = 1 + (score.max(1).ilog2() as u64);
                    payouts.push(Payout {
                        index,
                        worker: contribution.worker,
                        score,
                        weight,
                        reward: Credit::ZERO,
                    });
                }
                ContributionStatus::Contributed => {
                    forfeits.push((index, contribution.worker));
                }
                _ => silent.push(index),
            }
        }

        let total_weight: u64 = payouts.iter().map(|p| p.weight).sum();
        for payout in &mut payouts {
            payout.reward = workers_reward.mul_div(payout.weight, total_weight);
        }
        let workers_total: Credit = payouts.iter().map(|p| p.reward).sum();
        // Worker payouts are floored shares of a floored fraction of the
        // pool reward, so the subtraction cannot underflow; the
        // integer-division dust accrues to the scheduler, never lost.
        let scheduler_take = order.pool_reward.saturating_sub(workers_total);

        let jackpot = self.ledger.jackpot(pool).await;
        let jackpot_grant = if jackpot.is_zero() {
            Credit::ZERO
        } else {
            jackpot.min(
                jackpot
                    .mul_div(1, self.config.jackpot_skim_divisor)
                    .max(self.config.jackpot_min_grant),
            )
        };

        // Apply. Failures past this point are ledger invariant violations.
        for payout in &payouts {
            self.ledger.unlock(payout.worker, stake).await?;
            self.ledger
                .reward(requester, payout.worker, payout.reward)
                .await?;

            let contribution = &mut entry.contributions[payout.index];
            contribution.score = payout.score;
            contribution.weight = payout.weight;

            info!(
                order_id,
                worker = %payout.worker,
                weight = payout.weight,
                reward = %payout.reward,
                "💰 Worker rewarded"
            );
            self.emit(ProtocolEvent::AccurateContribution {
                order_id,
                worker: payout.worker,
                timestamp: Utc::now(),
            });
        }

        for (index, worker) in &forfeits {
            self.ledger.seize_to_jackpot(*worker, pool, stake).await?;
            self.scores.slash(worker).await;
            entry.contributions[*index].status = ContributionStatus::Rejected;

            warn!(order_id, worker = %worker, stake = %stake, "⚠️ Faulty contribution seized");
            self.emit(ProtocolEvent::FaultyContribution {
                order_id,
                worker: *worker,
                timestamp: Utc::now(),
            });
        }
        for index in silent {
            entry.contributions[index].status = ContributionStatus::Rejected;
        }

        self.ledger.unlock(scheduler, stake).await?;
        self.ledger.reward(requester, scheduler, scheduler_take).await?;
        if !entry.order.app_price.is_zero() {
            self.ledger
                .reward(requester, app_owner, entry.order.app_price)
                .await?;
        }
        if let Some(owner) = dataset_owner {
            if !entry.order.dataset_price.is_zero() {
                self.ledger
                    .reward(requester, owner, entry.order.dataset_price)
                    .await?;
            }
        }
        if !jackpot_grant.is_zero() {
            self.ledger.drain_jackpot(pool, scheduler, jackpot_grant).await?;
        }

        entry.order.result = Some(ResultMetadata {
            stdout,
            stderr,
            result_uri,
        });
        entry.order.transition_to(OrderStatus::Completed)?;

        info!(
            order_id,
            proved = payouts.len(),
            seized = forfeits.len(),
            scheduler_take = %scheduler_take,
            jackpot_grant = %jackpot_grant,
            "🏁 Work order completed"
        );
        self.emit(ProtocolEvent::WorkCompleted {
            order_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Claim a failed consensus past its timeout.
    ///
    /// Requester only. Refunds the requester in full, forfeits the
    /// scheduler's stake into the pool jackpot and returns every committed
    /// worker's stake: workers are not at fault for a stalled scheduler.
    pub async fn claim(&self, caller: Address, order_id: u64, now: i64) -> Result<()> {
        let mut orders = self.orders.write().await;
        let entry = orders
            .get_mut(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;

        if matches!(
            entry.order.status,
            OrderStatus::Completed | OrderStatus::Claimed
        ) {
            return Err(ConsensusError::AlreadyTerminal);
        }
        if caller != entry.order.requester {
            return Err(ConsensusError::Unauthorized(format!(
                "{} is not the requester of order {}",
                caller, order_id
            )));
        }
        let timeout = entry.order.consensus.consensus_timeout;
        if now <= timeout {
            return Err(ConsensusError::DeadlineNotReached {
                deadline: timeout,
                now,
            });
        }

        let stake = entry.order.consensus.required_stake_per_worker;
        let payment = entry.order.total_payment();
        let pool = entry.order.pool;
        let scheduler = entry.order.scheduler;
        let requester = entry.order.requester;

        self.ledger.unlock(requester, payment).await?;
        self.ledger.seize_to_jackpot(scheduler, pool, stake).await?;
        for contribution in &entry.contributions {
            if matches!(
                contribution.status,
                ContributionStatus::Contributed | ContributionStatus::Proved
            ) {
                self.ledger.unlock(contribution.worker, stake).await?;
            }
        }

        entry.order.transition_to(OrderStatus::Claimed)?;

        warn!(
            order_id,
            requester = %requester,
            refunded = %payment,
            scheduler_forfeit = %stake,
            "🛑 Failed consensus claimed"
        );
        self.emit(ProtocolEvent::WorkClaimed {
            order_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn order(&self, order_id: u64) -> Result<WorkOrder> {
        let orders = self.orders.read().await;
        orders
            .get(&order_id)
            .map(|e| e.order.clone())
            .ok_or(ConsensusError::OrderNotFound(order_id))
    }

    pub async fn contributions(&self, order_id: u64) -> Result<Vec<Contribution>> {
        let orders = self.orders.read().await;
        orders
            .get(&order_id)
            .map(|e| e.contributions.clone())
            .ok_or(ConsensusError::OrderNotFound(order_id))
    }

    pub async fn contribution(&self, order_id: u64, worker: &Address) -> Result<Contribution> {
        let orders = self.orders.read().await;
        let entry = orders
            .get(&order_id)
            .ok_or(ConsensusError::OrderNotFound(order_id))?;
        entry
            .contributions
            .iter()
            .find(|c| c.worker == *worker)
            .cloned()
            .ok_or(ConsensusError::ContributionNotFound(*worker))
    }
}

fn require_status(order: &WorkOrder, expected: OrderStatus) -> Result<()> {
    if order.status != expected {
        return Err(ConsensusError::InvalidState {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", order.status),
        });
    }
    Ok(())
}

fn insufficient_stake(err: LedgerError) -> ConsensusError {
    match err {
        LedgerError::InsufficientFunds { .. } => ConsensusError::InsufficientStake(err),
        other => ConsensusError::Ledger(other),
    }
}
