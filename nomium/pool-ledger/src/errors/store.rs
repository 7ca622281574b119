use thiserror::Error;

/// Failure reported by the key-value store backing the ledger.
///
/// These are never retried inside the ledger; callers decide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store command error: {0}")]
    Command(String),
    #[error("operation against a key holding the wrong kind of value: {key}")]
    WrongType { key: String },
    #[error("unparsable value {value:?} at {key}")]
    Parse { key: String, value: String },
}
