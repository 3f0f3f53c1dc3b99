use foreman_types::Credit;

/// Protocol-wide consensus timing and jackpot parameters.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Consensus timeout, as a multiple of the category time unit.
    pub consensus_duration_ratio: i64,
    /// Reveal window length, as a multiple of the category time unit.
    pub reveal_period_duration_ratio: i64,
    /// Share of the jackpot skimmed per finalization (divisor: 10 = 10%).
    pub jackpot_skim_divisor: u64,
    /// Minimum jackpot grant; smaller jackpots are paid out whole.
    pub jackpot_min_grant: Credit,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            consensus_duration_ratio: 10,
            reveal_period_duration_ratio: 2,
            jackpot_skim_divisor: 10,
            jackpot_min_grant: Credit::from_credits(1),
        }
    }
}
