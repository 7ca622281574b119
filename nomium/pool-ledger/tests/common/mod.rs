#![allow(dead_code)]

pub mod flaky_store;

use flaky_store::FlakyStore;
use pool_ledger::config::Settings;
use pool_ledger::models::Reward;
use pool_ledger::services::{HashrateRank, ManualClock, MinedShares};
use pool_ledger::storage::MemoryStore;
use pool_ledger::{PoolLedger, PoolLedgerBuilder};
use std::sync::Arc;

pub const START_MILLIS: i64 = 1_700_000_000_000;

pub struct Fixture {
    pub ledger: PoolLedger,
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlakyStore>,
    pub ranking: Arc<HashrateRank>,
}

pub fn settings() -> Settings {
    Settings::from_toml(
        r#"
        [store]
        prefix = "test"
        scan_count = 3
        "#,
    )
    .unwrap()
}

pub fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let store = Arc::new(FlakyStore::new(MemoryStore::new(clock.clone())));
    let ranking = Arc::new(HashrateRank::new());
    let ledger = PoolLedgerBuilder::new(store.clone())
        .with_settings(settings())
        .with_clock(clock.clone())
        .with_share_registry(Arc::new(MinedShares::new(1024)))
        .with_hashrate_ranking(ranking.clone())
        .build()
        .unwrap();
    Fixture {
        ledger,
        clock,
        store,
        ranking,
    }
}

pub fn reward(pre_hash: &str) -> Reward {
    Reward {
        pre_hash: pre_hash.to_string(),
        tx_block: format!("tx-{}", pre_hash),
        share: format!("share-{}", pre_hash),
        amount: 64.0,
        fee: 1.0,
    }
}
