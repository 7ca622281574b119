use crate::errors::LedgerError;
use crate::models::{ShareEvent, ShareOutcome};
use crate::storage::{join, KeySpace, Transaction};
use crate::traits::{Clock, HashrateRanking, KvStore, ShareRegistry};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Time-ordered share collections and the per-round counters fed by them.
#[derive(Clone)]
pub struct ShareLedger {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    registry: Arc<dyn ShareRegistry>,
    ranking: Arc<dyn HashrateRanking>,
    scan_count: usize,
}

impl ShareLedger {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: KeySpace,
        clock: Arc<dyn Clock>,
        registry: Arc<dyn ShareRegistry>,
        ranking: Arc<dyn HashrateRanking>,
        scan_count: usize,
    ) -> Self {
        Self {
            store,
            keys,
            clock,
            registry,
            ranking,
            scan_count,
        }
    }

    fn write_share(
        &self,
        tx: Transaction,
        event: &ShareEvent,
        retention: Duration,
    ) -> Transaction {
        let login_key = self.keys.login_hashrate(&event.login);
        tx.hincr_by(&self.keys.round_shares(), &event.login, event.diff)
            .zadd(
                &self.keys.hashrate(),
                event.score(),
                &join(&[&event.diff, &event.login, &event.worker_id, &event.millis]),
            )
            .zadd(
                &login_key,
                event.score(),
                &join(&[&event.diff, &event.worker_id, &event.millis]),
            )
            // miners that went quiet lose their detail history
            .expire(&login_key, retention)
    }

    pub async fn record_share(
        &self,
        login: &str,
        worker_id: &str,
        diff: i64,
        now_millis: i64,
        retention: Duration,
    ) -> Result<(), LedgerError> {
        let event = ShareEvent::new(diff, login, worker_id, now_millis);
        let tx = self.write_share(Transaction::new(), &event, retention);
        self.store.exec(tx).await.map_err(|e| {
            error!(target: "shares", "store share of {}.{} failed: {}", login, worker_id, e);
            LedgerError::from(e)
        })?;
        Ok(())
    }

    pub async fn record_invalid_share(
        &self,
        login: &str,
        worker_id: &str,
        diff: i64,
        now_millis: i64,
    ) -> Result<(), LedgerError> {
        let key = self.keys.invalid_hashrate();
        self.append_global(&key, ShareEvent::new(diff, login, worker_id, now_millis))
            .await
    }

    pub async fn record_rejected_share(
        &self,
        login: &str,
        worker_id: &str,
        diff: i64,
        now_millis: i64,
    ) -> Result<(), LedgerError> {
        let key = self.keys.reject_hashrate();
        self.append_global(&key, ShareEvent::new(diff, login, worker_id, now_millis))
            .await
    }

    async fn append_global(&self, key: &str, event: ShareEvent) -> Result<(), LedgerError> {
        let member = join(&[&event.diff, &event.login, &event.worker_id, &event.millis]);
        self.store
            .exec(Transaction::new().zadd(key, event.score(), &member))
            .await?;
        Ok(())
    }

    /// Records a share that is also a candidate for the job's block.
    ///
    /// Besides the plain share writes this stamps `lastShare` on the
    /// worker, miner and pool stats and accumulates the job's pool-wide and
    /// per-miner difficulty, all in one transaction. A share the registry
    /// has already seen is acknowledged without writing anything. When the
    /// transaction fails the share is unregistered and the ranking left
    /// alone, so the same share can be retried.
    pub async fn record_block_share(
        &self,
        login: &str,
        worker_id: &str,
        share: &str,
        diff: i64,
        job_hash: &str,
        retention: Duration,
    ) -> Result<ShareOutcome, LedgerError> {
        if self.registry.share_exists(share) {
            debug!(target: "shares", "duplicate share {} from {}.{}", share, login, worker_id);
            return Ok(ShareOutcome::Duplicate);
        }

        let now = self.clock.now_millis();
        let event = ShareEvent::new(diff, login, worker_id, now);
        let last_share = event.score().to_string();
        let tx = self
            .write_share(Transaction::new(), &event, retention)
            .hset(&self.keys.works(login, worker_id), "lastShare", &last_share)
            .hset(&self.keys.miner(login), "lastShare", &last_share)
            .hset(&self.keys.stats(), "lastShare", &last_share)
            .hincr_by(&self.keys.pool_diff(), job_hash, diff)
            .hincr_by(&self.keys.job(job_hash), login, diff);

        if let Err(e) = self.store.exec(tx).await {
            error!(target: "shares", "store block share {} of job {} failed: {}", share, job_hash, e);
            // nothing was written, so a resubmission must not look like a duplicate
            self.registry.forget(share);
            return Err(e.into());
        }

        self.ranking.inc_share_by_key(login, diff);
        self.ranking.inc_share_by_key("total", diff);
        Ok(ShareOutcome::Recorded)
    }

    /// Drops share entries older than `window` from the global collections
    /// and older than `large_window` from every per-login collection.
    ///
    /// Only entries strictly before the cutoff go, so concurrent appends are
    /// never touched. The cursor lives only for this call; an interrupted
    /// sweep is simply run again.
    pub async fn flush_stale(
        &self,
        window: Duration,
        large_window: Duration,
    ) -> Result<u64, LedgerError> {
        let now = self.clock.now_secs().max(0) as u64;
        let cutoff = now.saturating_sub(window.as_secs());
        let mut total = 0u64;

        for key in [
            self.keys.hashrate(),
            self.keys.invalid_hashrate(),
            self.keys.reject_hashrate(),
        ] {
            match self.remove_before(&key, cutoff).await {
                Ok(n) => total += n,
                Err(e) => {
                    warn!(target: "shares", "flush of {} failed after removing {}: {}", key, total, e);
                    return Err(e);
                }
            }
        }

        let large_cutoff = now.saturating_sub(large_window.as_secs());
        let pattern = self.keys.login_hashrate_pattern();
        let mut visited: HashSet<String> = HashSet::new();
        let mut cursor = 0u64;
        loop {
            let (next, keys) = match self.store.scan(cursor, &pattern, self.scan_count).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(target: "shares", "hashrate scan failed after removing {}: {}", total, e);
                    return Err(e.into());
                }
            };
            for key in keys {
                let login = match self.keys.login_of_hashrate_key(&key) {
                    Some(login) => login.to_string(),
                    None => continue,
                };
                if !visited.insert(login) {
                    continue;
                }
                match self.remove_before(&key, large_cutoff).await {
                    Ok(n) => total += n,
                    Err(e) => {
                        warn!(target: "shares", "flush of {} failed after removing {}: {}", key, total, e);
                        return Err(e);
                    }
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(
            target: "shares",
            "Flushed {} stale share entries across {} miners", total, visited.len()
        );
        Ok(total)
    }

    async fn remove_before(&self, key: &str, cutoff: u64) -> Result<u64, LedgerError> {
        let replies = self
            .store
            .exec(Transaction::new().zrem_range_by_score(key, 0, cutoff))
            .await?;
        let removed = match replies.into_iter().next() {
            Some(reply) => reply.into_int()?,
            None => 0,
        };
        Ok(removed.max(0) as u64)
    }
}
