use crate::traits::{HashrateRanking, ShareRegistry};
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};

/// Bounded memory of submitted block candidate shares, oldest forgotten
/// first.
pub struct MinedShares {
    capacity: usize,
    inner: Mutex<(HashSet<String>, VecDeque<String>)>,
}

impl MinedShares {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((HashSet::new(), VecDeque::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ShareRegistry for MinedShares {
    fn share_exists(&self, share: &str) -> bool {
        let mut guard = self.inner.lock();
        let (seen, order) = &mut *guard;
        if seen.contains(share) {
            return true;
        }
        if order.len() >= self.capacity {
            if let Some(oldest) = order.pop_front() {
                seen.remove(&oldest);
            }
        }
        seen.insert(share.to_string());
        order.push_back(share.to_string());
        false
    }

    fn forget(&self, share: &str) {
        let mut guard = self.inner.lock();
        let (seen, order) = &mut *guard;
        if seen.remove(share) {
            order.retain(|s| s != share);
        }
    }
}

/// Per-key accumulated difficulty used for hashrate ranking.
#[derive(Default)]
pub struct HashrateRank {
    totals: RwLock<HashMap<String, i64>>,
}

impl HashrateRank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> i64 {
        self.totals.read().get(key).copied().unwrap_or_default()
    }

    /// Returns and clears the accumulated totals.
    pub fn drain(&self) -> HashMap<String, i64> {
        std::mem::take(&mut *self.totals.write())
    }
}

impl HashrateRanking for HashrateRank {
    fn inc_share_by_key(&self, key: &str, diff: i64) {
        debug!("hashrate rank {} += {}", key, diff);
        *self.totals.write().entry(key.to_string()).or_default() += diff;
    }
}
