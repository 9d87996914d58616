use std::{collections::HashMap, sync::Arc, time::Duration};

use libp2p::PeerId;
use meshpath_circuit::{CircuitError, CircuitManager, Policy};
use meshpath_net_peer_store::PeerRecordStore;
use meshpath_tasks::TaskManager;
use meshpath_test_utils::{exit_record, init_tracing, peers, record};
use rand::{SeedableRng, rngs::StdRng};

fn populated_store(total: usize, exits: usize) -> Arc<PeerRecordStore> {
    let store = Arc::new(PeerRecordStore::new());
    for (i, peer) in peers(total).into_iter().enumerate() {
        if i < exits {
            store.upsert(exit_record(peer, "NL"));
        } else {
            store.upsert(record(peer));
        }
    }
    store
}

#[test]
fn exits_are_chosen_uniformly() {
    let store = populated_store(10, 3);
    let manager = CircuitManager::new(store, Policy::default(), PeerId::random())
        .with_rng(StdRng::seed_from_u64(7));

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..1000 {
        let circuit = manager.build_now().unwrap();
        assert!(circuit.exit().is_exit_capable);
        *counts.entry(circuit.exit().peer_id.clone()).or_default() += 1;
    }

    assert_eq!(counts.len(), 3);
    for (exit, count) in counts {
        // Expected 333 each; the bounds sit well over four standard deviations out.
        assert!((250..=420).contains(&count), "exit {exit} chosen {count} times");
    }
}

#[tokio::test(start_paused = true)]
async fn rotation_fires_on_interval() {
    init_tracing();
    let tasks = TaskManager::current();
    let manager = Arc::new(CircuitManager::new(
        populated_store(5, 2),
        Policy::default(),
        PeerId::random(),
    ));

    manager.start_rotation(Duration::from_millis(10), &tasks.executor());
    tokio::time::sleep(Duration::from_millis(55)).await;

    let attempts = manager.attempts();
    assert!((4..=6).contains(&attempts), "rotation fired {attempts} times");
    assert!(manager.current().is_some());

    assert!(tasks.graceful_shutdown_with_timeout(Duration::from_secs(1)).await);
}

#[tokio::test(start_paused = true)]
async fn published_circuit_survives_failing_rotations() {
    let tasks = TaskManager::current();
    let store = populated_store(3, 1);
    let manager = Arc::new(CircuitManager::new(
        store.clone(),
        Policy::default(),
        PeerId::random(),
    ));
    let first = manager.build_now().unwrap();

    // From here on every build fails.
    let removed = store.all().into_iter().next().unwrap();
    store.remove(&removed.parse_peer_id().unwrap());
    assert!(matches!(
        manager.build_now(),
        Err(CircuitError::InsufficientPeers { .. })
    ));

    manager.start_rotation(Duration::from_millis(10), &tasks.executor());
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(7)).await;
        let current = manager.current().unwrap();
        assert!(Arc::ptr_eq(&current, &first));
    }
    assert!(manager.attempts() >= 6);

    tasks.fire_shutdown_signal();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_rotation() {
    let tasks = TaskManager::current();
    let manager = Arc::new(CircuitManager::new(
        populated_store(5, 2),
        Policy::default(),
        PeerId::random(),
    ));

    let handle = manager.start_rotation(Duration::from_millis(10), &tasks.executor());
    tokio::time::sleep(Duration::from_millis(25)).await;
    let before = manager.attempts();
    assert_eq!(before, 2);

    tasks.fire_shutdown_signal();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.attempts(), before);
}

#[tokio::test(start_paused = true)]
async fn shutdown_wins_over_due_tick() {
    let tasks = TaskManager::current();
    let manager = Arc::new(CircuitManager::new(
        populated_store(5, 2),
        Policy::default(),
        PeerId::random(),
    ));

    let handle = manager.start_rotation(Duration::from_millis(10), &tasks.executor());
    tokio::task::yield_now().await;

    // Shutdown and the first tick are both ready when the task next runs.
    tasks.fire_shutdown_signal();
    tokio::time::advance(Duration::from_millis(10)).await;
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(manager.attempts(), 0);
    assert!(manager.current().is_none());
}
