mod common;

use common::{fixture, START_MILLIS};
use pool_ledger::storage::{KeySpace, Transaction};
use pool_ledger::traits::KvStore;
use std::time::Duration;

const START_SECS: i64 = START_MILLIS / 1000;
const KEEP: Duration = Duration::from_secs(1_000_000);

fn at(secs_ago: i64) -> i64 {
    (START_SECS - secs_ago) * 1000
}

async fn zcard(f: &common::Fixture, key: &str) -> i64 {
    let replies = f.store.exec(Transaction::new().zcard(key)).await.unwrap();
    replies.into_iter().next().unwrap().into_int().unwrap()
}

#[tokio::test]
async fn test_flush_cutoff_is_exclusive() {
    let f = fixture();
    let shares = &f.ledger.shares;
    shares.record_share("alice", "rig", 10, at(600), KEEP).await.unwrap();
    shares.record_share("alice", "rig", 20, at(601), KEEP).await.unwrap();
    shares.record_share("alice", "rig", 30, at(86_401), KEEP).await.unwrap();

    let removed = shares
        .flush_stale(Duration::from_secs(600), Duration::from_secs(86_400))
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let keys = KeySpace::new("test");
    assert_eq!(zcard(&f, &keys.hashrate()).await, 1);
    let kept: Vec<i64> = f
        .ledger
        .reporting
        .login_shares("alice")
        .await
        .unwrap()
        .iter()
        .map(|s| s.diff)
        .collect();
    assert_eq!(kept, vec![20, 10]);
}

#[tokio::test]
async fn test_flush_visits_every_login_across_pages() {
    let f = fixture();
    for i in 0..10 {
        let login = format!("miner{}", i);
        f.ledger.shares.record_share(&login, "rig", 1, at(90_000), KEEP).await.unwrap();
        f.ledger.shares.record_share(&login, "rig", 2, at(5), KEEP).await.unwrap();
    }

    let removed = f
        .ledger
        .shares
        .flush_stale(Duration::from_secs(600), Duration::from_secs(86_400))
        .await
        .unwrap();
    assert_eq!(removed, 20);
    for i in 0..10 {
        let left = f.ledger.reporting.login_shares(&format!("miner{}", i)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].diff, 2);
    }
}

#[tokio::test]
async fn test_flush_visits_every_login_when_keys_empty_mid_sweep() {
    let f = fixture();
    for i in 0..10 {
        let login = format!("miner{}", i);
        f.ledger.shares.record_share(&login, "rig", 1, at(90_000), KEEP).await.unwrap();
        if i % 2 == 1 {
            f.ledger.shares.record_share(&login, "rig", 2, at(5), KEEP).await.unwrap();
        }
    }

    let removed = f
        .ledger
        .shares
        .flush_stale(Duration::from_secs(600), Duration::from_secs(86_400))
        .await
        .unwrap();
    assert_eq!(removed, 20);

    let keys = KeySpace::new("test");
    for i in 0..10 {
        let login = format!("miner{}", i);
        let left = f.ledger.reporting.login_shares(&login).await.unwrap();
        assert!(left.iter().all(|e| e.diff == 2), "{} kept a stale share", login);
        if i % 2 == 0 {
            assert!(left.is_empty());
            assert_eq!(zcard(&f, &keys.login_hashrate(&login)).await, 0);
        } else {
            assert_eq!(left.len(), 1);
        }
    }
}

#[tokio::test]
async fn test_flush_trims_invalid_and_rejected_collections() {
    let f = fixture();
    let shares = &f.ledger.shares;
    shares.record_invalid_share("alice", "rig", 5, at(700)).await.unwrap();
    shares.record_invalid_share("alice", "rig", 5, at(10)).await.unwrap();
    shares.record_rejected_share("bob", "rig", 5, at(10)).await.unwrap();

    let removed = shares
        .flush_stale(Duration::from_secs(600), Duration::from_secs(86_400))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let keys = KeySpace::new("test");
    assert_eq!(zcard(&f, &keys.invalid_hashrate()).await, 1);
    assert_eq!(zcard(&f, &keys.reject_hashrate()).await, 1);
}

#[tokio::test]
async fn test_quiet_miner_detail_expires() {
    let f = fixture();
    f.ledger
        .shares
        .record_share("alice", "rig", 10, START_MILLIS, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(f.ledger.reporting.login_shares("alice").await.unwrap().len(), 1);

    f.clock.advance(Duration::from_secs(61));
    assert!(f.ledger.reporting.login_shares("alice").await.unwrap().is_empty());
    assert_eq!(zcard(&f, &KeySpace::new("test").hashrate()).await, 1);
}

#[tokio::test]
async fn test_failed_scan_reports_error() {
    let f = fixture();
    f.ledger.shares.record_share("alice", "rig", 1, at(5), KEEP).await.unwrap();
    f.store.fail_on("hashrate:*", 1);

    let result = f
        .ledger
        .shares
        .flush_stale(Duration::from_secs(600), Duration::from_secs(86_400))
        .await;
    assert!(result.unwrap_err().is_store());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_runs_until_shutdown() {
    let f = fixture();
    f.ledger.shares.record_share("alice", "rig", 1, at(700), KEEP).await.unwrap();
    f.ledger.shares.record_share("alice", "rig", 1, at(5), KEEP).await.unwrap();

    let sweeper = f.ledger.sweeper().with_interval(Duration::from_secs(1));
    let (shutdown, handle) = sweeper.spawn();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    shutdown.send(true).unwrap();

    let removed = handle.await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(zcard(&f, &KeySpace::new("test").hashrate()).await, 1);
}
