use chrono::{DateTime, Utc};
use foreman_types::{Address, Credit, Digest};

/// Observable protocol side effects, for monitoring and testing.
///
/// Emission is best-effort: a dropped receiver never fails an operation.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    OrderActivated {
        order_id: u64,
        pool: Address,
        requester: Address,
        pool_reward: Credit,
        timestamp: DateTime<Utc>,
    },
    WorkerAuthorized {
        order_id: u64,
        worker: Address,
        timestamp: DateTime<Utc>,
    },
    ContributionMade {
        order_id: u64,
        worker: Address,
        result_hash: Digest,
        timestamp: DateTime<Utc>,
    },
    ConsensusRevealed {
        order_id: u64,
        consensus_hash: Digest,
        winner_count: u32,
        timestamp: DateTime<Utc>,
    },
    WorkerRevealed {
        order_id: u64,
        worker: Address,
        timestamp: DateTime<Utc>,
    },
    WorkCompleted {
        order_id: u64,
        timestamp: DateTime<Utc>,
    },
    WorkClaimed {
        order_id: u64,
        timestamp: DateTime<Utc>,
    },
    AccurateContribution {
        order_id: u64,
        worker: Address,
        timestamp: DateTime<Utc>,
    },
    FaultyContribution {
        order_id: u64,
        worker: Address,
        timestamp: DateTime<Utc>,
    },
}
