use std::{sync::Arc, time::Duration};

use assert_matches::assert_matches;
use futures::{AsyncWriteExt, StreamExt};
use libp2p::{Multiaddr, PeerId};
use meshpath_net_exchange::{
    ExchangeConfig, ExchangeError, ExchangeRequest, ExchangeService, MalformedRecord, PROTOCOL,
    PeerReachable, PeerRecord, RecordStream, StreamError, Substrate,
};
use meshpath_net_peer_store::PeerRecordStore;
use meshpath_tasks::TaskManager;
use meshpath_test_utils::{MemoryNetwork, MemorySubstrate, exit_record, init_tracing, record};
use tokio::sync::{mpsc, oneshot};

type Service = ExchangeService<MemorySubstrate>;

fn service(network: &MemoryNetwork, manager: &TaskManager, config: ExchangeConfig) -> Arc<Service> {
    let substrate = network.substrate();
    let local = exit_record(substrate.local_peer_id(), "NL");
    Arc::new(ExchangeService::new(
        substrate,
        Arc::new(PeerRecordStore::new()),
        local,
        config,
        manager.executor(),
    ))
}

fn serve(manager: &TaskManager, service: &Arc<Service>) {
    let incoming = service.listen().unwrap();
    let service = service.clone();
    manager
        .executor()
        .spawn_with_graceful_shutdown_signal("inbound", |shutdown| {
            service.run_inbound(incoming, shutdown)
        });
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exchange_round_trip() {
    init_tracing();
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let bob = service(&network, &manager, ExchangeConfig::default());
    serve(&manager, &bob);

    let received = alice.exchange_with(bob.local_peer_id()).await.unwrap();

    assert_eq!(received, bob.local_record());
    assert_eq!(alice.store().get(&bob.local_peer_id()), Some(bob.local_record()));
    // The responder stores before it answers.
    assert_eq!(bob.store().get(&alice.local_peer_id()), Some(alice.local_record()));

    assert!(manager.graceful_shutdown_with_timeout(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn exchange_replaces_previous_record() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let bob = service(&network, &manager, ExchangeConfig::default());
    serve(&manager, &bob);

    alice.exchange_with(bob.local_peer_id()).await.unwrap();

    let updated = record(bob.local_peer_id()).with_country_code("DE");
    bob.update_local_record(updated.clone());
    alice.exchange_with(bob.local_peer_id()).await.unwrap();

    let stored = alice.store().get(&bob.local_peer_id()).unwrap();
    assert_eq!(stored, updated);
    assert!(!stored.is_exit_capable);
}

#[tokio::test]
async fn request_deduplicates() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let bob = service(&network, &manager, ExchangeConfig::default());
    serve(&manager, &bob);

    let bob_id = bob.local_peer_id();
    assert_eq!(alice.request(alice.local_peer_id(), true), ExchangeRequest::LocalPeer);
    assert_eq!(alice.request(bob_id, false), ExchangeRequest::Started);
    assert_eq!(alice.request(bob_id, false), ExchangeRequest::InFlight);
    assert_eq!(alice.request(bob_id, true), ExchangeRequest::InFlight);

    wait_until(|| alice.store().contains(&bob_id) && alice.in_flight_count() == 0).await;

    assert_eq!(alice.request(bob_id, false), ExchangeRequest::AlreadyKnown);
    assert_eq!(alice.request(bob_id, true), ExchangeRequest::Started);
}

#[tokio::test]
async fn unsupported_protocol_is_a_stream_error() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    // Bob never registers for the protocol.
    let bob = service(&network, &manager, ExchangeConfig::default());

    let err = alice.exchange_with(bob.local_peer_id()).await.unwrap_err();
    assert_matches!(err, ExchangeError::Stream(StreamError::UnsupportedProtocol(_)));
    assert_eq!(err.reason(), "stream_error");
    assert!(alice.store().is_empty());
}

#[tokio::test]
async fn record_for_another_peer_is_rejected() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let mallory = network.substrate();
    let mut incoming = mallory.accept(PROTOCOL).unwrap();

    let victim = PeerId::random();
    tokio::spawn(async move {
        let (remote, stream) = incoming.next().await.unwrap();
        let mut stream = RecordStream::new(stream, remote);
        stream.receive().await.unwrap();
        stream.send(exit_record(victim, "US")).await.unwrap();
        stream.close().await;
    });

    let err = alice
        .exchange_with(mallory.local_peer_id())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ExchangeError::Malformed(MalformedRecord::PeerMismatch { actual, .. })
            if actual == mallory.local_peer_id()
    );
    assert!(!alice.store().contains(&victim));
    assert!(alice.store().is_empty());
}

#[tokio::test]
async fn garbage_reply_is_malformed() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let remote = network.substrate();
    let mut incoming = remote.accept(PROTOCOL).unwrap();

    tokio::spawn(async move {
        let (_, mut stream) = incoming.next().await.unwrap();
        stream.write_all(&[4, 0xff, 0xff, 0xff, 0xff]).await.unwrap();
        stream.close().await.unwrap();
    });

    let err = alice.exchange_with(remote.local_peer_id()).await.unwrap_err();
    assert_matches!(err, ExchangeError::Malformed(MalformedRecord::Codec(_)));
    assert!(alice.store().is_empty());
}

#[tokio::test]
async fn invalid_record_from_initiator_is_not_stored() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let bob = service(&network, &manager, ExchangeConfig::default());
    serve(&manager, &bob);

    let alice = network.substrate();
    let stream = alice.open(bob.local_peer_id(), PROTOCOL).await.unwrap();
    let mut stream = RecordStream::new(stream, bob.local_peer_id());
    stream
        .send(PeerRecord::from(alice.local_peer_id()).with_bandwidth_score(-1.0))
        .await
        .unwrap();

    // Bob aborts without answering.
    assert_matches!(
        stream.receive().await,
        Err(ExchangeError::Stream(StreamError::Closed))
    );
    assert!(bob.store().is_empty());
}

#[tokio::test]
async fn closed_before_reply_is_a_stream_error() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let remote = network.substrate();
    let mut incoming = remote.accept(PROTOCOL).unwrap();

    tokio::spawn(async move {
        let (peer, stream) = incoming.next().await.unwrap();
        let mut stream = RecordStream::new(stream, peer);
        stream.receive().await.unwrap();
        // Dropped without replying.
    });

    let err = alice.exchange_with(remote.local_peer_id()).await.unwrap_err();
    assert_matches!(err, ExchangeError::Stream(StreamError::Closed));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_peer_times_out() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let config = ExchangeConfig::default().with_timeout(Duration::from_secs(2));
    let alice = service(&network, &manager, config);
    let remote = network.substrate();
    let mut incoming = remote.accept(PROTOCOL).unwrap();

    // Accept and hold the stream without ever answering.
    tokio::spawn(async move {
        let _held = incoming.next().await;
        futures::future::pending::<()>().await;
    });

    let started = tokio::time::Instant::now();
    let err = alice.exchange_with(remote.local_peer_id()).await.unwrap_err();
    assert_matches!(err, ExchangeError::Timeout(d) if d == Duration::from_secs(2));
    assert_eq!(err.reason(), "timeout");
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(alice.store().is_empty());
}

#[tokio::test]
async fn shutdown_aborts_in_flight_exchange() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let remote = network.substrate();
    let mut incoming = remote.accept(PROTOCOL).unwrap();

    let (accepted_tx, accepted_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _held = incoming.next().await;
        let _ = accepted_tx.send(());
        futures::future::pending::<()>().await;
    });

    let remote_id = remote.local_peer_id();
    assert_eq!(alice.request(remote_id, false), ExchangeRequest::Started);
    accepted_rx.await.unwrap();
    assert_eq!(alice.in_flight_count(), 1);

    // Released long before the 30s exchange timeout.
    manager.fire_shutdown_signal();
    wait_until(|| alice.in_flight_count() == 0).await;
    assert!(alice.store().is_empty());
}

#[tokio::test]
async fn inbound_over_capacity_is_dropped() {
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let bob = service(
        &network,
        &manager,
        ExchangeConfig::default().with_max_concurrent(0),
    );
    serve(&manager, &bob);

    let err = alice.exchange_with(bob.local_peer_id()).await.unwrap_err();
    assert_matches!(err, ExchangeError::Stream(_));
    assert!(bob.store().is_empty());
}

#[tokio::test]
async fn discovery_exchanges_with_reachable_peers() {
    init_tracing();
    let manager = TaskManager::current();
    let network = MemoryNetwork::new();
    let alice = service(&network, &manager, ExchangeConfig::default());
    let peers: Vec<_> = (0..3)
        .map(|_| {
            let peer = service(&network, &manager, ExchangeConfig::default());
            serve(&manager, &peer);
            peer
        })
        .collect();

    let (tx, rx) = mpsc::channel(8);
    let discovery = alice.clone();
    manager
        .executor()
        .spawn_with_graceful_shutdown_signal("discovery", |shutdown| {
            discovery.run_discovery(rx, shutdown)
        });

    let addresses: Vec<Multiaddr> = (1..=peers.len())
        .map(|i| format!("/ip4/192.0.2.{i}/tcp/4001").parse().unwrap())
        .collect();
    for (peer, address) in peers.iter().zip(&addresses) {
        let event = PeerReachable::new(peer.local_peer_id()).with_address(address.clone());
        tx.send(event).await.unwrap();
    }
    // Reaching ourselves is ignored.
    let own = PeerReachable::new(alice.local_peer_id()).with_address(addresses[0].clone());
    tx.send(own).await.unwrap();

    wait_until(|| alice.store().len() == peers.len()).await;
    let expected: Vec<_> = peers
        .iter()
        .map(|p| p.local_peer_id())
        .zip(addresses)
        .collect();
    assert_eq!(network.address_hints(&alice.local_peer_id()), expected);
    for peer in &peers {
        assert_eq!(
            alice.store().get(&peer.local_peer_id()),
            Some(peer.local_record())
        );
        assert!(peer.store().contains(&alice.local_peer_id()));
    }

    assert!(manager.graceful_shutdown_with_timeout(Duration::from_secs(1)).await);
}
