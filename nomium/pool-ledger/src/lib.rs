//! Accounting core of a mining pool: share ledger, per-job minimum share
//! tournament, reward distribution and fixed-point account balances, all
//! written against an atomic key-value store.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;
pub mod traits;

use crate::config::Settings;
use crate::errors::LedgerError;
use crate::models::{Scaled, ScanReport};
use crate::services::{
    AccountLedger, HashrateRank, JobTournament, MinedShares, Reporting, RewardEngine,
    RetryConfig, ShareLedger, StaleSweeper, SystemClock,
};
use crate::storage::{KeySpace, RedisStore};
use crate::traits::{Clock, HashrateRanking, KvStore, ShareRegistry};
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

const MINED_SHARES_CAPACITY: usize = 100_000;

/// All ledger services sharing one store and one set of collaborators.
#[derive(Clone)]
pub struct PoolLedger {
    pub shares: ShareLedger,
    pub tournament: JobTournament,
    pub rewards: RewardEngine,
    pub accounts: AccountLedger,
    pub reporting: Reporting,
    store: Arc<dyn KvStore>,
    settings: Settings,
}

pub struct PoolLedgerBuilder {
    store: Arc<dyn KvStore>,
    settings: Option<Settings>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<Arc<dyn ShareRegistry>>,
    ranking: Option<Arc<dyn HashrateRanking>>,
}

impl PoolLedgerBuilder {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            settings: None,
            clock: None,
            registry: None,
            ranking: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_share_registry(mut self, registry: Arc<dyn ShareRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_hashrate_ranking(mut self, ranking: Arc<dyn HashrateRanking>) -> Self {
        self.ranking = Some(ranking);
        self
    }

    /// Falls back to [`Settings::new`] when no settings were given.
    pub fn build(self) -> Result<PoolLedger, LedgerError> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => Settings::new()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(MinedShares::new(MINED_SHARES_CAPACITY)));
        let ranking = self.ranking.unwrap_or_else(|| Arc::new(HashrateRank::new()));

        let keys = KeySpace::new(&settings.store.prefix);
        let scan_count = settings.store.scan_count;
        let store = self.store;

        let shares = ShareLedger::new(
            store.clone(),
            keys.clone(),
            clock,
            registry,
            ranking,
            scan_count,
        );
        let tournament = JobTournament::new(store.clone(), keys.clone());
        let accounts = AccountLedger::new(store.clone(), keys.clone());
        let reporting = Reporting::new(store.clone(), keys.clone(), scan_count);
        let rewards = RewardEngine::new(
            store.clone(),
            keys,
            accounts.clone(),
            tournament.clone(),
            reporting.clone(),
        );

        info!("Pool ledger ready under prefix {}", settings.store.prefix);
        Ok(PoolLedger {
            shares,
            tournament,
            rewards,
            accounts,
            reporting,
            store,
            settings,
        })
    }
}

impl PoolLedger {
    /// Connects to the store named by `settings.store.url` and builds the
    /// ledger over it with default collaborators.
    pub async fn connect(settings: Settings) -> Result<Self, LedgerError> {
        let store = RedisStore::connect(&settings.store.url).await?;
        PoolLedgerBuilder::new(Arc::new(store))
            .with_settings(settings)
            .build()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Store liveness check.
    pub async fn check(&self) -> Result<String, LedgerError> {
        Ok(self.store.ping().await?)
    }

    /// Miners whose unpaid balance exceeds the configured payout threshold.
    pub async fn miners_to_pay(&self) -> ScanReport<BTreeMap<String, Scaled>> {
        let threshold = Scaled::from_whole(self.settings.rewards.payout_threshold);
        self.reporting.miners_above_threshold(threshold).await
    }

    /// Backoff for [`RewardEngine::retry_failed`], from the `retry` section.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.settings.retry)
    }

    pub fn sweeper(&self) -> StaleSweeper {
        StaleSweeper::new(self.shares.clone(), &self.settings.retention)
    }
}
