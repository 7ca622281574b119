use crate::errors::{LedgerError, StoreError};
use crate::storage::{KeySpace, Transaction, HELD_HOLDER, HELD_VALUE};
use crate::traits::KvStore;
use log::{debug, error};
use std::sync::Arc;

/// Per-job race for the smallest share value.
///
/// `mini:<job>` holds the login owning the minimum, `submit:<job>` the
/// share that produced it. Both are replaced in one transaction, and only
/// by a strictly smaller value, so equal values keep the one that was
/// committed first and readers never see the two disagree.
#[derive(Clone)]
pub struct JobTournament {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl JobTournament {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Enters `candidate` for `job_hash`; returns whether this share now
    /// holds the job's minimum.
    pub async fn try_set_minimum(
        &self,
        job_hash: &str,
        login: &str,
        share: &str,
        candidate: u64,
    ) -> Result<bool, LedgerError> {
        let tx = Transaction::new()
            .hold_minimum(&self.keys.mini(job_hash), candidate, login)
            .hold_minimum(&self.keys.submit(job_hash), candidate, share);

        let replies = self.store.exec(tx).await.map_err(|e| {
            error!(target: "shares", "Get {} min share failed {}", job_hash, e);
            LedgerError::from(e)
        })?;
        let held = replies.into_iter().nth(1).map(|reply| reply.into_held()).transpose()?;

        let is_winner = matches!(&held, Some((holder, value)) if holder == share && *value == candidate);
        debug!(
            target: "shares",
            "job {} candidate {} from {}/{}: held {:?}, winner {}",
            job_hash, candidate, login, share, held, is_winner
        );
        Ok(is_winner)
    }

    /// Whether `share` is the job's current minimum share.
    pub async fn is_recognized_winner(&self, job_hash: &str, share: &str) -> Result<bool, LedgerError> {
        let replies = self
            .store
            .exec(Transaction::new().hget(&self.keys.submit(job_hash), HELD_HOLDER))
            .await
            .map_err(|e| {
                error!(target: "shares", "check pool submitted share error: {}", e);
                LedgerError::from(e)
            })?;
        let holder = match replies.into_iter().next() {
            Some(reply) => reply.into_value()?,
            None => None,
        };
        Ok(holder.as_deref() == Some(share))
    }

    /// Login and value currently holding the job's minimum.
    pub async fn finder(&self, job_hash: &str) -> Result<Option<(String, u64)>, LedgerError> {
        let mini = self.keys.mini(job_hash);
        let replies = self
            .store
            .exec(Transaction::new().hget(&mini, HELD_HOLDER).hget(&mini, HELD_VALUE))
            .await?;
        let mut fields = replies.into_iter();
        let holder = fields.next().map(|reply| reply.into_value()).transpose()?.flatten();
        let value = fields.next().map(|reply| reply.into_value()).transpose()?.flatten();
        match (holder, value) {
            (Some(holder), Some(raw)) => {
                let value = raw.parse().map_err(|_| StoreError::Parse {
                    key: format!("{}/{}", mini, HELD_VALUE),
                    value: raw,
                })?;
                Ok(Some((holder, value)))
            }
            _ => Ok(None),
        }
    }
}
