use crate::errors::LedgerError;
use crate::models::{AccountSnapshot, BalanceEntry, BalanceKind, Reward, Scaled};
use crate::storage::{join, Command, KeySpace, Transaction};
use crate::traits::KvStore;
use log::{error, info};
use std::sync::Arc;
use uuid::Uuid;

const REWARD: &str = "reward";
const UNPAID: &str = "unpaid";
const PAYMENT: &str = "payment";

fn secs(millis: i64) -> u64 {
    (millis / 1000).max(0) as u64
}

/// Keeps otherwise identical history events distinct within a sorted set.
fn event_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Fixed-point balance counters and their history streams.
///
/// `reward` and `unpaid` only ever move together on credit, `payment` and
/// `unpaid` only ever move together on payment, so `unpaid == reward -
/// payment` holds without being recomputed.
#[derive(Clone)]
pub struct AccountLedger {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl AccountLedger {
    pub fn new(store: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    pub async fn credit_reward(
        &self,
        login: &str,
        amount: Scaled,
        now_millis: i64,
        tx_hash: &str,
        job_hash: &str,
    ) -> Result<(), LedgerError> {
        let account = self.keys.account(login);
        let ts = secs(now_millis);
        let id = event_id();
        let tx = Transaction::new()
            .hincr_by(&account, REWARD, amount.units())
            .hincr_by(&account, UNPAID, amount.units())
            .zadd(
                &self.keys.rewards(login),
                ts,
                &join(&[&amount, &now_millis, &id, &tx_hash, &job_hash]),
            )
            .zadd(
                &self.keys.balance(login),
                ts,
                &join(&[&BalanceKind::Reward.tag(), &amount, &now_millis, &id, &tx_hash, &job_hash]),
            );

        self.store.exec(tx).await.map_err(|e| {
            error!(target: "ledger", "store reward of {} for {} failed: {}", amount, login, e);
            LedgerError::from(e)
        })?;
        Ok(())
    }

    pub async fn record_payment(
        &self,
        login: &str,
        amount: Scaled,
        tx_hash: &str,
        remark: &str,
        now_millis: i64,
    ) -> Result<(), LedgerError> {
        let account = self.keys.account(login);
        let pool = self.keys.pool_account();
        let ts = secs(now_millis);
        let tag = BalanceKind::Payment.tag();
        let id = event_id();
        let tx = Transaction::new()
            .hincr_by(&account, PAYMENT, amount.units())
            .hincr_by(&account, UNPAID, -amount.units())
            .hincr_by(&pool, PAYMENT, amount.units())
            .hincr_by(&pool, UNPAID, -amount.units())
            .zadd(
                &self.keys.payment(login),
                ts,
                &join(&[&amount, &now_millis, &id, &tx_hash, &remark]),
            )
            .zadd(
                &self.keys.balance(login),
                ts,
                &join(&[&tag, &amount, &now_millis, &id, &tx_hash, &remark]),
            )
            .zadd(
                &self.keys.pool_payment(),
                ts,
                &join(&[&amount, &now_millis, &id, &tx_hash, &login, &remark]),
            )
            .zadd(
                &self.keys.pool_balance(),
                ts,
                &join(&[&tag, &amount, &now_millis, &id, &tx_hash, &login]),
            );

        self.store.exec(tx).await.map_err(|e| {
            error!(target: "ledger", "store payment of {} to {} failed: {}", amount, login, e);
            LedgerError::from(e)
        })?;
        info!(target: "ledger", "Paid {} to {} in {}", amount, login, tx_hash);
        Ok(())
    }

    /// Credits the pool account with a won block.
    pub async fn credit_pool(
        &self,
        login: &str,
        reward: &Reward,
        amount: Scaled,
        fee: Scaled,
        now_millis: i64,
    ) -> Result<(), LedgerError> {
        let pool = self.keys.pool_account();
        let ts = secs(now_millis);
        let id = event_id();
        let tx = Transaction::new()
            .hincr_by(&pool, REWARD, amount.units())
            .hincr_by(&pool, UNPAID, amount.units())
            .zadd(
                &self.keys.pool_rewards(),
                ts,
                &join(&[
                    &amount,
                    &fee,
                    &now_millis,
                    &id,
                    &reward.tx_block,
                    &reward.pre_hash,
                    &login,
                    &reward.share,
                ]),
            )
            .zadd(
                &self.keys.pool_balance(),
                ts,
                &join(&[
                    &BalanceKind::Reward.tag(),
                    &amount,
                    &now_millis,
                    &id,
                    &reward.tx_block,
                    &reward.pre_hash,
                ]),
            );
        self.store.exec(tx).await?;
        Ok(())
    }

    /// Appends a donation/fund event; independent of account balances.
    pub async fn record_fund(
        &self,
        fund: &str,
        tx_hash: &str,
        job_hash: &str,
        remark: &str,
        amount: Scaled,
        now_millis: i64,
    ) -> Result<(), LedgerError> {
        let tx = Transaction::new().zadd(
            &self.keys.donate(fund),
            secs(now_millis),
            &join(&[&amount, &now_millis, &event_id(), &tx_hash, &job_hash, &remark]),
        );
        self.store.exec(tx).await?;
        Ok(())
    }

    pub async fn account(&self, login: &str) -> Result<AccountSnapshot, LedgerError> {
        self.snapshot(&self.keys.account(login)).await
    }

    pub async fn pool_account(&self) -> Result<AccountSnapshot, LedgerError> {
        self.snapshot(&self.keys.pool_account()).await
    }

    async fn snapshot(&self, key: &str) -> Result<AccountSnapshot, LedgerError> {
        let tx = Transaction::new()
            .hget(key, REWARD)
            .hget(key, UNPAID)
            .hget(key, PAYMENT);
        let mut fields = Vec::with_capacity(3);
        for (reply, field) in self
            .store
            .exec(tx)
            .await?
            .into_iter()
            .zip([REWARD, UNPAID, PAYMENT])
        {
            fields.push(parse_units(key, field, reply.into_value()?)?);
        }
        Ok(AccountSnapshot {
            reward: fields[0],
            unpaid: fields[1],
            payment: fields[2],
        })
    }

    pub async fn balance_history(&self, login: &str) -> Result<Vec<BalanceEntry>, LedgerError> {
        self.history(&self.keys.balance(login)).await
    }

    pub async fn pool_balance_history(&self) -> Result<Vec<BalanceEntry>, LedgerError> {
        self.history(&self.keys.pool_balance()).await
    }

    async fn history(&self, key: &str) -> Result<Vec<BalanceEntry>, LedgerError> {
        let reply = self
            .store
            .run(Command::ZRangeWithScores {
                key: key.to_string(),
                start: 0,
                stop: -1,
            })
            .await?;
        Ok(reply
            .into_scored()?
            .iter()
            .filter_map(|(member, _)| BalanceEntry::parse(member))
            .collect())
    }
}

pub(crate) fn parse_units(key: &str, field: &str, raw: Option<String>) -> Result<Scaled, LedgerError> {
    match raw {
        None => Ok(Scaled::ZERO),
        Some(raw) => raw.parse::<i64>().map(Scaled::from_units).map_err(|_| {
            LedgerError::Store(crate::errors::StoreError::Parse {
                key: format!("{}/{}", key, field),
                value: raw,
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ManualClock;
    use crate::storage::MemoryStore;

    fn ledger() -> AccountLedger {
        let store = Arc::new(MemoryStore::new(Arc::new(ManualClock::new(0))));
        AccountLedger::new(store, KeySpace::new("t"))
    }

    #[tokio::test]
    async fn credit_then_payment_keeps_unpaid_in_lockstep() {
        let ledger = ledger();
        ledger
            .credit_reward("alice", Scaled::from_coins(2.5), 1_000, "tx1", "J1")
            .await
            .unwrap();
        ledger
            .record_payment("alice", Scaled::from_coins(1.0), "tx2", "payout", 2_000)
            .await
            .unwrap();

        let account = ledger.account("alice").await.unwrap();
        assert_eq!(account.reward, Scaled::from_coins(2.5));
        assert_eq!(account.payment, Scaled::from_coins(1.0));
        assert_eq!(account.unpaid, Scaled::from_coins(1.5));
        assert!(account.is_consistent());

        let history = ledger.balance_history("alice").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, BalanceKind::Reward);
        assert_eq!(history[0].reference, "J1");
        assert_eq!(history[1].kind, BalanceKind::Payment);
        assert_eq!(history[1].tx_hash, "tx2");
    }

    #[tokio::test]
    async fn payment_moves_pool_counters() {
        let ledger = ledger();
        let reward = Reward {
            pre_hash: "P1".into(),
            tx_block: "blk".into(),
            share: "s".into(),
            amount: 64.0,
            fee: 1.0,
        };
        ledger
            .credit_pool("alice", &reward, Scaled::from_whole(64), Scaled::from_whole(1), 1_000)
            .await
            .unwrap();
        ledger
            .record_payment("alice", Scaled::from_whole(4), "tx", "", 2_000)
            .await
            .unwrap();

        let pool = ledger.pool_account().await.unwrap();
        assert_eq!(pool.reward, Scaled::from_whole(64));
        assert_eq!(pool.unpaid, Scaled::from_whole(60));
        assert!(pool.is_consistent());
        assert_eq!(ledger.pool_balance_history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_account_is_zero() {
        let account = ledger().account("nobody").await.unwrap();
        assert_eq!(account, AccountSnapshot::default());
    }
}
