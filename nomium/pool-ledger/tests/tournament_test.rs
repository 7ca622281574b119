mod common;

use common::fixture;
use std::time::Duration;

#[tokio::test]
async fn test_end_to_end_job_example() {
    let f = fixture();
    let ledger = &f.ledger;
    let window = Duration::from_secs(3600);

    for (login, diff, share, value) in [
        ("loginA", 100, "shareA", 50u64),
        ("loginB", 250, "shareB", 30),
        ("loginC", 50, "shareC", 80),
    ] {
        ledger
            .shares
            .record_block_share(login, "rig", share, diff, "J1", window)
            .await
            .unwrap();
        ledger
            .tournament
            .try_set_minimum("J1", login, share, value)
            .await
            .unwrap();
    }

    assert!(ledger.tournament.is_recognized_winner("J1", "shareB").await.unwrap());
    assert!(!ledger.tournament.is_recognized_winner("J1", "shareA").await.unwrap());
    assert!(!ledger.tournament.is_recognized_winner("J1", "shareC").await.unwrap());
    // asking twice changes nothing
    assert!(ledger.tournament.is_recognized_winner("J1", "shareB").await.unwrap());

    let diffs = ledger.reporting.participant_diffs("J1").await.into_result().unwrap();
    let sum: i64 = diffs.iter().map(|(_, d)| d).sum();
    assert_eq!(ledger.reporting.pool_diff("J1").await.unwrap(), sum);
    assert_eq!(sum, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_candidates_yield_single_minimum() {
    let f = fixture();
    let values: Vec<u64> = (0..64u64).map(|i| (i * 7919) % 1000 + 1_000).collect();
    let min = *values.iter().min().unwrap();

    let mut handles = Vec::new();
    for (i, value) in values.iter().copied().enumerate() {
        let tournament = f.ledger.tournament.clone();
        handles.push(tokio::spawn(async move {
            tournament
                .try_set_minimum("J7", &format!("miner{}", i), &format!("share{}", i), value)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let (finder, value) = f.ledger.tournament.finder("J7").await.unwrap().unwrap();
    assert_eq!(value, min);

    let mut recognized = Vec::new();
    for i in 0..values.len() {
        if f.ledger
            .tournament
            .is_recognized_winner("J7", &format!("share{}", i))
            .await
            .unwrap()
        {
            recognized.push(i);
        }
    }
    assert_eq!(recognized.len(), 1);
    assert_eq!(values[recognized[0]], min);
    assert_eq!(finder, format!("miner{}", recognized[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ties_keep_one_winner() {
    let f = fixture();
    let mut handles = Vec::new();
    for i in 0..32 {
        let tournament = f.ledger.tournament.clone();
        handles.push(tokio::spawn(async move {
            tournament
                .try_set_minimum("J9", &format!("miner{}", i), &format!("share{}", i), 42)
                .await
                .unwrap()
        }));
    }
    let mut winners_at_submit = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners_at_submit += 1;
        }
    }
    assert_eq!(winners_at_submit, 1);

    let (finder, _) = f.ledger.tournament.finder("J9").await.unwrap().unwrap();
    let share = finder.replace("miner", "share");
    assert!(f.ledger.tournament.is_recognized_winner("J9", &share).await.unwrap());
}
