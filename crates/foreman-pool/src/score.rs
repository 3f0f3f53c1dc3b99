use foreman_types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Default cap on how much score a single faulty contribution can remove.
pub const DEFAULT_SLASH_CAP: u64 = 50;

/// Process-wide worker reliability scores.
///
/// A score belongs to the worker, not to any one work order: it grows by one
/// for every proved contribution and shrinks by at most `slash_cap` when a
/// contribution is rejected. Scores never go negative.
pub struct ScoreBoard {
    scores: Arc<RwLock<HashMap<Address, u64>>>,
    slash_cap: u64,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new(DEFAULT_SLASH_CAP)
    }
}

impl ScoreBoard {
    pub fn new(slash_cap: u64) -> Self {
        Self {
            scores: Arc::new(RwLock::new(HashMap::new())),
            slash_cap,
        }
    }

    pub async fn score_of(&self, worker: &Address) -> u64 {
        let scores = self.scores.read().await;
        scores.get(worker).copied().unwrap_or(0)
    }

    /// Credit one proved contribution. Returns the new score.
    pub async fn increment(&self, worker: &Address) -> u64 {
        let mut scores = self.scores.write().await;
        let score = scores.entry(*worker).or_insert(0);
        *score += 1;

        info!(worker = %worker, score = *score, "⭐ Worker score incremented");
        *score
    }

    /// Punish one rejected contribution: remove `min(score, slash_cap)`.
    /// Returns the amount actually removed.
    pub async fn slash(&self, worker: &Address) -> u64 {
        let mut scores = self.scores.write().await;
        let score = scores.entry(*worker).or_insert(0);
        let removed = (*score).min(self.slash_cap);
        *score -= removed;

        warn!(
            worker = %worker,
            removed = removed,
            score = *score,
            "📉 Worker score slashed"
        );
        removed
    }

    /// Set a worker's score directly, for tests and bootstrapping.
    pub async fn set_score(&self, worker: &Address, score: u64) {
        let mut scores = self.scores.write().await;
        scores.insert(*worker, score);
    }
}

impl Clone for ScoreBoard {
    fn clone(&self) -> Self {
        Self {
            scores: Arc::clone(&self.scores),
            slash_cap: self.slash_cap,
        }
    }
}
