use foreman_types::{Address, Digest, Lifecycle};
use serde::{Deserialize, Serialize};

/// Status of one worker's contribution to one work order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionStatus {
    #[default]
    Unset,
    /// Scheduler cleared the worker to contribute.
    Authorized,
    /// Worker committed a result hash and locked stake.
    Contributed,
    /// Worker revealed a preimage matching the declared consensus.
    Proved,
    /// Contribution never reached Proved by settlement time.
    Rejected,
}

impl Lifecycle for ContributionStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Proved | Self::Rejected)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use ContributionStatus::*;
        match (self, next) {
            (Unset, Authorized) => true,
            (Authorized, Contributed) => true,
            (Authorized, Rejected) => true,
            (Contributed, Proved) => true,
            (Contributed, Rejected) => true,
            (Proved, _) | (Rejected, _) => false,
            _ => false,
        }
    }
}

/// One worker's commit record for one work order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub worker: Address,
    pub status: ContributionStatus,
    /// blake3 of the result preimage; zero until the worker contributes.
    pub result_hash: Digest,
    /// blake3 binding of the preimage to the worker; zero until contribution.
    pub result_sign: Digest,
    /// Optional trusted-execution attestation challenge set at authorization.
    pub enclave_challenge: Option<Digest>,
    /// Worker score snapshot recorded at settlement.
    pub score: u64,
    /// Reward weight derived from the score at settlement.
    pub weight: u64,
}

impl Contribution {
    /// A freshly authorized contribution with no commitment yet.
    pub fn authorized(worker: Address, enclave_challenge: Option<Digest>) -> Self {
        Self {
            worker,
            status: ContributionStatus::Authorized,
            result_hash: Digest::ZERO,
            result_sign: Digest::ZERO,
            enclave_challenge,
            score: 0,
            weight: 0,
        }
    }
}
