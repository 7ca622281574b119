use super::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The reward candidate was not in `waiting` any more, so its outcome
    /// has already been applied by someone else.
    #[error("reward candidate {pre_hash} already processed")]
    AlreadyProcessed { pre_hash: String },

    #[error("no participants recorded for job {job_hash}")]
    EmptyParticipantSet { job_hash: String },

    #[error("no minimum share finder recorded for job {job_hash}")]
    NoFinder { job_hash: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl LedgerError {
    /// True for transport/command failures of the store, as opposed to a
    /// definite answer about ledger state.
    pub fn is_store(&self) -> bool {
        matches!(self, LedgerError::Store(_))
    }
}
