use super::account_ledger::AccountLedger;
use super::reporting::{effective_total, Reporting};
use super::retry::{retry_operation, RetryConfig};
use super::split::{even_split, proportional_split};
use super::tournament::JobTournament;
use crate::config::RewardMode;
use crate::errors::LedgerError;
use crate::models::{CandidateState, Credit, Distribution, FailedCredit, Reward, Scaled};
use crate::storage::{KeySpace, Transaction};
use crate::traits::KvStore;
use log::{error, info, warn};
use std::sync::Arc;

/// Moves reward candidates out of `waiting` exactly once and splits
/// confirmed rewards across miners.
#[derive(Clone)]
pub struct RewardEngine {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    accounts: AccountLedger,
    tournament: JobTournament,
    reporting: Reporting,
}

impl RewardEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: KeySpace,
        accounts: AccountLedger,
        tournament: JobTournament,
        reporting: Reporting,
    ) -> Self {
        Self {
            store,
            keys,
            accounts,
            tournament,
            reporting,
        }
    }

    pub async fn add_waiting(&self, pre_hash: &str) -> Result<(), LedgerError> {
        self.store
            .exec(Transaction::new().sadd(&self.keys.waiting(), pre_hash))
            .await
            .map_err(|e| {
                error!(target: "ledger", "add job waiting set error {}: {}", pre_hash, e);
                LedgerError::from(e)
            })?;
        Ok(())
    }

    pub async fn candidate_state(&self, pre_hash: &str) -> Result<Option<CandidateState>, LedgerError> {
        let tx = Transaction::new()
            .sismember(&self.keys.waiting(), pre_hash)
            .sismember(&self.keys.win(), pre_hash)
            .sismember(&self.keys.lost(), pre_hash);
        let states = [CandidateState::Waiting, CandidateState::Win, CandidateState::Lost];
        for (reply, state) in self.store.exec(tx).await?.into_iter().zip(states) {
            if reply.into_bool()? {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    async fn resolve(&self, pre_hash: &str, destination: &str) -> Result<(), LedgerError> {
        let replies = self
            .store
            .exec(Transaction::new().smove(&self.keys.waiting(), destination, pre_hash))
            .await?;
        let moved = match replies.into_iter().next() {
            Some(reply) => reply.into_bool()?,
            None => false,
        };
        if moved {
            Ok(())
        } else {
            Err(LedgerError::AlreadyProcessed {
                pre_hash: pre_hash.to_string(),
            })
        }
    }

    /// `waiting -> win`, then credits the pool account with the block.
    ///
    /// If the credit fails the candidate is moved back to `waiting`, so the
    /// confirmation can be repeated without losing the reward.
    pub async fn confirm_win(&self, login: &str, reward: &Reward, now_millis: i64) -> Result<(), LedgerError> {
        self.resolve(&reward.pre_hash, &self.keys.win()).await?;

        let amount = Scaled::from_coins(reward.amount);
        let fee = Scaled::from_coins(reward.fee);
        if let Err(e) = self.accounts.credit_pool(login, reward, amount, fee, now_millis).await {
            error!(target: "ledger", "store pool reward of {} failed: {}", reward.pre_hash, e);
            self.release(&reward.pre_hash).await;
            return Err(e);
        }
        info!(
            target: "ledger",
            "Block {} won by {} for {} (fee {})", reward.pre_hash, login, amount, fee
        );
        Ok(())
    }

    async fn release(&self, pre_hash: &str) {
        let tx = Transaction::new().smove(&self.keys.win(), &self.keys.waiting(), pre_hash);
        match self.store.exec(tx).await {
            Ok(_) => warn!(target: "ledger", "Block {} returned to waiting", pre_hash),
            Err(e) => error!(target: "ledger", "Block {} stuck in win set: {}", pre_hash, e),
        }
    }

    /// `waiting -> lost`. Nothing is credited either way; an
    /// `AlreadyProcessed` answer is logged and returned for the caller to
    /// ignore if it wishes.
    pub async fn confirm_lost(&self, reward: &Reward) -> Result<(), LedgerError> {
        match self.resolve(&reward.pre_hash, &self.keys.lost()).await {
            Ok(()) => {
                info!(target: "ledger", "Block {} lost", reward.pre_hash);
                Ok(())
            }
            Err(e) => {
                warn!(target: "ledger", "store lost set error {}: {}", reward.pre_hash, e);
                Err(e)
            }
        }
    }

    /// Pays `fee` to the miner holding the job's minimum share.
    pub async fn reward_finder(&self, reward: &Reward, fee: f64, now_millis: i64) -> Result<Distribution, LedgerError> {
        let job_hash = &reward.pre_hash;
        let (finder, _) = match self.tournament.finder(job_hash).await {
            Ok(Some(finder)) => finder,
            Ok(None) => {
                error!(target: "ledger", "lowest hash finder not found {}", job_hash);
                return Err(LedgerError::NoFinder {
                    job_hash: job_hash.clone(),
                });
            }
            Err(e) => {
                error!(target: "ledger", "get lowest hash finder by job error {}: {}", job_hash, e);
                return Err(e);
            }
        };
        let credits = vec![Credit {
            login: finder,
            amount: Scaled::from_coins(fee),
        }];
        Ok(self.apply(reward, credits, now_millis).await)
    }

    /// Splits `fee` evenly across every miner that contributed to the job.
    pub async fn reward_solo(&self, reward: &Reward, fee: f64, now_millis: i64) -> Result<Distribution, LedgerError> {
        let job_hash = &reward.pre_hash;
        let miners = self.reporting.participants(job_hash).await.into_result()?;
        if miners.is_empty() {
            error!(target: "ledger", "solo direct reward miners count is 0 {}", job_hash);
            return Err(LedgerError::EmptyParticipantSet {
                job_hash: job_hash.clone(),
            });
        }
        let credits = even_split(Scaled::from_coins(fee), &miners);
        Ok(self.apply(reward, credits, now_millis).await)
    }

    /// Splits `amount` by contributed difficulty and `fee` evenly, reading
    /// the job's difficulty counters as they are now.
    pub async fn reward_proportional(
        &self,
        reward: &Reward,
        fee: f64,
        amount: f64,
        now_millis: i64,
    ) -> Result<Distribution, LedgerError> {
        let job_hash = &reward.pre_hash;
        let diffs = self.reporting.participant_diffs(job_hash).await.into_result()?;
        let pool_diff = self.reporting.pool_diff(job_hash).await?;
        let total = effective_total(pool_diff, &diffs);
        if diffs.is_empty() || total <= 0 {
            error!(target: "ledger", "equal direct reward miners count is 0 {}", job_hash);
            return Err(LedgerError::EmptyParticipantSet {
                job_hash: job_hash.clone(),
            });
        }
        let credits = proportional_split(
            Scaled::from_coins(amount),
            Scaled::from_coins(fee),
            &diffs,
            total,
        );
        Ok(self.apply(reward, credits, now_millis).await)
    }

    /// Runs the split configured by `mode`. `amount` only matters for
    /// [`RewardMode::Equal`].
    pub async fn distribute(
        &self,
        mode: RewardMode,
        reward: &Reward,
        fee: f64,
        amount: f64,
        now_millis: i64,
    ) -> Result<Distribution, LedgerError> {
        match mode {
            RewardMode::Solo => self.reward_solo(reward, fee, now_millis).await,
            RewardMode::Equal => self.reward_proportional(reward, fee, amount, now_millis).await,
            RewardMode::Finder => self.reward_finder(reward, fee, now_millis).await,
        }
    }

    /// Credits every miner in its own transaction; failures are collected,
    /// not rolled back.
    async fn apply(&self, reward: &Reward, credits: Vec<Credit>, now_millis: i64) -> Distribution {
        let mut distribution = Distribution::new(&reward.pre_hash);
        for credit in credits {
            match self
                .accounts
                .credit_reward(&credit.login, credit.amount, now_millis, &reward.tx_block, &reward.pre_hash)
                .await
            {
                Ok(()) => distribution.credited.push(credit),
                Err(error) => {
                    error!(
                        target: "ledger",
                        "store direct reward error {} {} {}: {}",
                        reward.pre_hash, credit.login, credit.amount, error
                    );
                    distribution.failed.push(FailedCredit { credit, error });
                }
            }
        }
        distribution
    }

    /// Re-applies only the failed credits of `distribution`, each with its
    /// own backoff.
    pub async fn retry_failed(
        &self,
        mut distribution: Distribution,
        reward: &Reward,
        now_millis: i64,
        config: &RetryConfig,
    ) -> Distribution {
        let failed = std::mem::take(&mut distribution.failed);
        for FailedCredit { credit, .. } in failed {
            let name = format!("reward {} for {}", reward.pre_hash, credit.login);
            let accounts = &self.accounts;
            let credit_ref = &credit;
            let result = retry_operation(
                move || async move {
                    accounts
                        .credit_reward(
                            &credit_ref.login,
                            credit_ref.amount,
                            now_millis,
                            &reward.tx_block,
                            &reward.pre_hash,
                        )
                        .await
                },
                config,
                &name,
            )
            .await;
            match result {
                Ok(()) => distribution.credited.push(credit),
                Err(error) => distribution.failed.push(FailedCredit { credit, error }),
            }
        }
        distribution
    }
}
