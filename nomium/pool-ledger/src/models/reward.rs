use serde::{Deserialize, Serialize};

/// A block submission awaiting its confirmation verdict.
///
/// `pre_hash` identifies both the candidate and the job whose shares
/// are rewarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub pre_hash: String,
    pub tx_block: String,
    pub share: String,
    pub amount: f64,
    pub fee: f64,
}

/// Membership of a reward candidate in the `waiting`/`win`/`lost` sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Waiting,
    Win,
    Lost,
}
