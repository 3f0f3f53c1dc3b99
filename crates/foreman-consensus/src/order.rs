use crate::error::{ConsensusError, Result};
use foreman_types::{Address, Credit, Digest, Lifecycle};
use serde::{Deserialize, Serialize};

/// Work order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Not yet activated by the marketplace.
    Unset,
    /// Activated; workers may be authorized and contribute.
    Active,
    /// Consensus declared; winning workers must reveal.
    Revealing,
    /// Finalized and settled.
    Completed,
    /// Abandoned past its timeout and refunded to the requester.
    Claimed,
}

impl Lifecycle for OrderStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Claimed)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Unset, Active) => true,

            // From Active
            (Active, Revealing) => true,
            (Active, Claimed) => true,

            // From Revealing
            (Revealing, Completed) => true,
            (Revealing, Claimed) => true,

            // Terminal states cannot transition
            (Completed, _) | (Claimed, _) => false,

            // All other transitions are invalid
            _ => false,
        }
    }
}

/// Consensus bookkeeping for one work order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusDetails {
    /// Stake locked per contribution (and by the scheduler at activation).
    pub required_stake_per_worker: Credit,
    /// The scheduler-declared canonical result hash; unset until the
    /// consensus is revealed.
    pub consensus_hash: Option<Digest>,
    /// When the consensus was declared.
    pub reveal_date: i64,
    /// Deadline for winning workers to reveal.
    pub consensus_deadline: i64,
    /// Deadline for the whole consensus, fixed at activation; past it the
    /// requester may claim a failed consensus.
    pub consensus_timeout: i64,
    /// Number of successful reveals so far.
    pub reveal_counter: u32,
    /// Number of contributions matching the declared consensus hash.
    pub winner_count: u32,
}

/// Opaque execution metadata recorded at finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub stdout: String,
    pub stderr: String,
    pub result_uri: String,
}

/// One unit of requested computation, tracked from activation to a terminal
/// outcome. Orders are never deleted; terminal orders remain as audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: u64,
    pub pool: Address,
    /// Owner of the pool at activation time.
    pub scheduler: Address,
    pub app: Address,
    /// Zero address if the order uses no dataset.
    pub dataset: Address,
    pub category: u64,
    pub trust: u64,
    pub requester: Address,
    pub app_price: Credit,
    pub dataset_price: Credit,
    pub pool_reward: Credit,
    /// Scheduler reward share captured from the pool policy at activation.
    pub scheduler_reward_ratio_pct: u64,
    pub activated_at: i64,
    pub status: OrderStatus,
    pub consensus: ConsensusDetails,
    pub result: Option<ResultMetadata>,
}

impl WorkOrder {
    /// The requester's full locked payment for this order.
    pub fn total_payment(&self) -> Credit {
        self.pool_reward
            .saturating_add(self.app_price)
            .saturating_add(self.dataset_price)
    }

    /// Transition the order to a new status, enforcing the state machine.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(&next) {
            return Err(ConsensusError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", next),
            });
        }

        tracing::debug!(
            order_id = self.id,
            from = ?self.status,
            to = ?next,
            "Work order state transition"
        );

        self.status = next;
        Ok(())
    }
}
