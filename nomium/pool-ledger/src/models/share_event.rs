use serde::{Deserialize, Serialize};

/// One accepted share as kept in the hashrate collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEvent {
    pub diff: i64,
    pub login: String,
    pub worker_id: String,
    pub millis: i64,
}

impl ShareEvent {
    pub fn new(diff: i64, login: &str, worker_id: &str, millis: i64) -> Self {
        Self {
            diff,
            login: login.to_string(),
            worker_id: worker_id.to_string(),
            millis,
        }
    }

    /// Ordering score of the event: its second timestamp.
    pub fn score(&self) -> u64 {
        (self.millis / 1000).max(0) as u64
    }

    /// Parses a `diff:worker:millis` member of a per-login collection.
    pub fn from_login_member(login: &str, member: &str) -> Option<Self> {
        let (diff, rest) = member.split_once(':')?;
        let (worker_id, millis) = rest.rsplit_once(':')?;
        Some(Self {
            diff: diff.parse().ok()?,
            login: login.to_string(),
            worker_id: worker_id.to_string(),
            millis: millis.parse().ok()?,
        })
    }
}

/// Result of submitting a block candidate share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Recorded,
    /// Already seen by the duplicate detector; nothing was written.
    Duplicate,
}
