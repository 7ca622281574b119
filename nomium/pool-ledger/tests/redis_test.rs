use pool_ledger::config::Settings;
use pool_ledger::models::{CandidateState, Reward, Scaled, ShareOutcome};
use pool_ledger::PoolLedger;
use std::time::Duration;
use uuid::Uuid;

const URL: &str = "redis://127.0.0.1:6379";

async fn ledger() -> PoolLedger {
    let prefix = format!("it-{}", Uuid::new_v4().simple());
    let settings = Settings::from_toml(&format!(
        "[store]\nurl = \"{}\"\nprefix = \"{}\"\nscan_count = 2\n",
        URL, prefix
    ))
    .unwrap();
    PoolLedger::connect(settings).await.unwrap()
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn test_redis_tournament_is_exact_and_first_wins() {
    let ledger = ledger().await;
    let t = &ledger.tournament;
    let big = u64::MAX - 1;
    assert!(t.try_set_minimum("J1", "alice", "s1", big).await.unwrap());
    assert!(t.try_set_minimum("J1", "bob", "s2", big - 1).await.unwrap());
    assert!(!t.try_set_minimum("J1", "bob", "s3", big - 1).await.unwrap());
    assert_eq!(t.finder("J1").await.unwrap(), Some(("bob".to_string(), big - 1)));
    assert!(t.is_recognized_winner("J1", "s2").await.unwrap());
    assert!(!t.is_recognized_winner("J1", "s3").await.unwrap());
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn test_redis_share_and_reward_roundtrip() {
    let ledger = ledger().await;
    assert_eq!(ledger.check().await.unwrap(), "PONG");

    let window = Duration::from_secs(3600);
    for (i, login) in ["alice", "bob", "carol"].iter().enumerate() {
        let outcome = ledger
            .shares
            .record_block_share(login, "rig", &format!("s{}", i), 10, "J2", window)
            .await
            .unwrap();
        assert_eq!(outcome, ShareOutcome::Recorded);
    }
    let participants = ledger.reporting.participants("J2").await.into_result().unwrap();
    assert_eq!(participants.len(), 3);

    let reward = Reward {
        pre_hash: "J2".into(),
        tx_block: "blk".into(),
        share: "s0".into(),
        amount: 64.0,
        fee: 1.0,
    };
    ledger.rewards.add_waiting("J2").await.unwrap();
    ledger.rewards.confirm_win("alice", &reward, 1_700_000_000_000).await.unwrap();
    assert_eq!(
        ledger.rewards.candidate_state("J2").await.unwrap(),
        Some(CandidateState::Win)
    );
    assert_eq!(ledger.accounts.pool_account().await.unwrap().reward, Scaled::from_whole(64));
}
