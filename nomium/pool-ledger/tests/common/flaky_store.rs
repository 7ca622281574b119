use async_trait::async_trait;
use parking_lot::Mutex;
use pool_ledger::errors::StoreError;
use pool_ledger::storage::{MemoryStore, Reply, Transaction};
use pool_ledger::traits::KvStore;

/// Wraps a [`MemoryStore`] and fails any transaction or scan touching a key
/// that contains one of the armed fragments.
pub struct FlakyStore {
    inner: MemoryStore,
    poisoned: Mutex<Vec<(String, usize)>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            poisoned: Mutex::new(Vec::new()),
        }
    }

    /// Fails the next `times` operations touching a key containing `fragment`.
    pub fn fail_on(&self, fragment: &str, times: usize) {
        self.poisoned.lock().push((fragment.to_string(), times));
    }

    pub fn heal(&self) {
        self.poisoned.lock().clear();
    }

    fn check(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut poisoned = self.poisoned.lock();
        for (fragment, remaining) in poisoned.iter_mut() {
            if *remaining > 0 && keys.iter().any(|k| k.contains(fragment.as_str())) {
                *remaining -= 1;
                return Err(StoreError::Connection(format!("injected failure on {}", fragment)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn ping(&self) -> Result<String, StoreError> {
        self.inner.ping().await
    }

    async fn exec(&self, tx: Transaction) -> Result<Vec<Reply>, StoreError> {
        {
            let keys: Vec<&str> = tx.commands().iter().flat_map(|c| c.keys()).collect();
            self.check(&keys)?;
        }
        self.inner.exec(tx).await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        self.check(&[pattern])?;
        self.inner.scan(cursor, pattern, count).await
    }

    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<(String, String)>), StoreError> {
        self.check(&[key])?;
        self.inner.hscan(key, cursor, count).await
    }
}
