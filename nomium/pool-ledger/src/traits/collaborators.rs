/// Millisecond time source.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;

    fn now_secs(&self) -> i64 {
        self.now_millis() / 1000
    }
}

/// Registry of block candidate shares already submitted.
pub trait ShareRegistry: Send + Sync {
    /// Returns `true` if `share` was seen before; otherwise remembers it.
    fn share_exists(&self, share: &str) -> bool;

    /// Drops `share` so a later submission of it is accepted again.
    fn forget(&self, share: &str);
}

/// Accumulator feeding the hashrate ranking. Fire and forget.
pub trait HashrateRanking: Send + Sync {
    fn inc_share_by_key(&self, key: &str, diff: i64);
}
