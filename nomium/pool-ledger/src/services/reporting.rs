use crate::errors::{LedgerError, StoreError};
use crate::models::{Scaled, ScanReport, ShareEvent};
use crate::services::account_ledger::parse_units;
use crate::storage::{Command, KeySpace, Transaction};
use crate::traits::KvStore;
use log::error;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only views over accounts and jobs. Scans follow a live cursor, so
/// results are eventually consistent with concurrent writers.
#[derive(Clone)]
pub struct Reporting {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    scan_count: usize,
}

impl Reporting {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace, scan_count: usize) -> Self {
        Self {
            store,
            keys,
            scan_count,
        }
    }

    /// Logins whose unpaid balance is strictly above `threshold`.
    pub async fn miners_above_threshold(&self, threshold: Scaled) -> ScanReport<BTreeMap<String, Scaled>> {
        let mut miners = BTreeMap::new();
        let mut first_error: Option<LedgerError> = None;
        let pattern = self.keys.account_pattern();
        let mut cursor = 0u64;

        loop {
            let (next, keys) = match self.store.scan(cursor, &pattern, self.scan_count).await {
                Ok(page) => page,
                Err(e) => {
                    error!(target: "ledger", "scan miner unpaid error: {}", e);
                    return ScanReport::partial(miners, first_error.unwrap_or(e.into()));
                }
            };
            for key in keys {
                let login = match self.keys.login_of_account_key(&key) {
                    Some(login) => login.to_string(),
                    None => continue,
                };
                match self.unpaid(&key).await {
                    Ok(unpaid) if unpaid > threshold => {
                        miners.insert(login, unpaid);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(target: "ledger", "iter miner unpaid error {}: {}", login, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        match first_error {
            Some(e) => ScanReport::partial(miners, e),
            None => ScanReport::complete(miners),
        }
    }

    async fn unpaid(&self, account_key: &str) -> Result<Scaled, LedgerError> {
        let reply = self
            .store
            .run(Command::HGet {
                key: account_key.to_string(),
                field: "unpaid".to_string(),
            })
            .await?;
        parse_units(account_key, "unpaid", reply.into_value()?)
    }

    /// Pool-wide difficulty accumulated for `job_hash`.
    pub async fn pool_diff(&self, job_hash: &str) -> Result<i64, LedgerError> {
        let key = self.keys.pool_diff();
        let replies = self.store.exec(Transaction::new().hget(&key, job_hash)).await?;
        match replies.into_iter().next() {
            Some(reply) => match reply.into_value()? {
                Some(raw) => raw.parse().map_err(|_| {
                    StoreError::Parse {
                        key: format!("{}/{}", key, job_hash),
                        value: raw,
                    }
                    .into()
                }),
                None => Ok(0),
            },
            None => Ok(0),
        }
    }

    /// Difficulty contributed by each participant of `job_hash`, ordered by
    /// login.
    pub async fn participant_diffs(&self, job_hash: &str) -> ScanReport<Vec<(String, i64)>> {
        let key = self.keys.job(job_hash);
        let mut diffs: BTreeMap<String, i64> = BTreeMap::new();
        let mut cursor = 0u64;

        loop {
            let (next, fields) = match self.store.hscan(&key, cursor, self.scan_count).await {
                Ok(page) => page,
                Err(e) => {
                    error!(target: "ledger", "scan participants of {} error: {}", job_hash, e);
                    return ScanReport::partial(diffs.into_iter().collect(), e.into());
                }
            };
            for (login, raw) in fields {
                match raw.parse::<i64>() {
                    Ok(diff) => {
                        diffs.insert(login, diff);
                    }
                    Err(_) => {
                        let e = StoreError::Parse {
                            key: format!("{}/{}", key, login),
                            value: raw,
                        };
                        return ScanReport::partial(diffs.into_iter().collect(), e.into());
                    }
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        ScanReport::complete(diffs.into_iter().collect())
    }

    /// Each participant's fraction of the job's total difficulty.
    pub async fn participant_shares(&self, job_hash: &str) -> ScanReport<BTreeMap<String, f64>> {
        let report = self.participant_diffs(job_hash).await;
        let pool_diff = match self.pool_diff(job_hash).await {
            Ok(d) => d,
            Err(e) => return ScanReport::partial(BTreeMap::new(), e),
        };
        let total = effective_total(pool_diff, &report.items);
        let shares = report
            .items
            .iter()
            .map(|(login, diff)| {
                let fraction = if total > 0 { *diff as f64 / total as f64 } else { 0.0 };
                (login.clone(), fraction)
            })
            .collect();
        ScanReport {
            items: shares,
            error: report.error,
        }
    }

    pub async fn participants(&self, job_hash: &str) -> ScanReport<Vec<String>> {
        let report = self.participant_diffs(job_hash).await;
        ScanReport {
            items: report.items.into_iter().map(|(login, _)| login).collect(),
            error: report.error,
        }
    }

    /// Shares still held in a miner's detail collection, oldest first.
    pub async fn login_shares(&self, login: &str) -> Result<Vec<ShareEvent>, LedgerError> {
        let reply = self
            .store
            .run(Command::ZRangeWithScores {
                key: self.keys.login_hashrate(login),
                start: 0,
                stop: -1,
            })
            .await?;
        Ok(reply
            .into_scored()?
            .iter()
            .filter_map(|(member, _)| ShareEvent::from_login_member(login, member))
            .collect())
    }
}

/// Pool diff of the job, or the participants' sum when the pool counter is
/// missing.
pub(crate) fn effective_total(pool_diff: i64, diffs: &[(String, i64)]) -> i64 {
    if pool_diff > 0 {
        pool_diff
    } else {
        diffs.iter().map(|(_, d)| *d).sum()
    }
}
