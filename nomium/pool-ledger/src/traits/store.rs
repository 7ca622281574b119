use async_trait::async_trait;
use crate::errors::StoreError;
use crate::storage::{Command, Reply, Transaction};

/// Atomic key-value store the ledger is written against.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn ping(&self) -> Result<String, StoreError>;

    /// Applies every command of `tx` atomically and returns one reply per
    /// command, in order. A transport or queueing error leaves nothing
    /// from `tx` visible; a Redis server does not undo commands that fail
    /// while `EXEC` runs, which only a type mismatch can cause here.
    async fn exec(&self, tx: Transaction) -> Result<Vec<Reply>, StoreError>;

    /// One page of keys matching `pattern`, which is either an exact key or
    /// a literal prefix followed by a single trailing `*`. A returned cursor
    /// of `0` means the iteration is complete. Keys may repeat across pages,
    /// and a key present for the whole iteration is returned at least once
    /// even if other keys are removed in between.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError>;

    /// One page of `(field, value)` pairs of the hash at `key`.
    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<(String, String)>), StoreError>;

    async fn run(&self, command: Command) -> Result<Reply, StoreError> {
        let mut replies = self.exec(Transaction::new().push(command)).await?;
        replies
            .pop()
            .ok_or_else(|| StoreError::Command("empty reply".into()))
    }
}
