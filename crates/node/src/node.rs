//! Wiring the exchange service and the circuit manager into one node.

use std::sync::Arc;

use eyre::WrapErr;
use libp2p::{Multiaddr, PeerId};
use meshpath_circuit::{Circuit, CircuitError, CircuitManager};
use meshpath_net_exchange::{ExchangeService, PeerReachable, Substrate};
use meshpath_net_peer_store::PeerRecordStore;
use meshpath_tasks::TaskExecutor;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::{LocalRecordConfig, NodeConfig},
    constants::REACHABLE_EVENTS_CAPACITY,
    geoip::{CountryLookup, GeoIp},
    record::local_record,
};

/// A running meshpath node core.
///
/// Holds the shared peer store, the exchange service writing into it and the
/// circuit manager reading from it. Background work is spawned on the
/// executor given to [`Node::new`] and stops when its task manager fires the
/// shutdown signal.
pub struct Node<S: Substrate> {
    config: NodeConfig,
    store: Arc<PeerRecordStore>,
    exchange: Arc<ExchangeService<S>>,
    circuits: Arc<CircuitManager>,
    countries: Option<Arc<dyn CountryLookup>>,
    executor: TaskExecutor,
}

impl<S: Substrate> Node<S> {
    /// Validate `config` and assemble the node. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(
        substrate: S,
        config: NodeConfig,
        listen_addrs: &[Multiaddr],
        executor: TaskExecutor,
    ) -> eyre::Result<Self> {
        config.validate().wrap_err("invalid node configuration")?;

        let local_peer_id = substrate.local_peer_id();
        let store = Arc::new(PeerRecordStore::new());
        let countries = open_country_lookup(&config.local);
        let local = local_record(
            local_peer_id,
            &config.local,
            listen_addrs,
            countries.as_deref(),
        );
        debug!(?local, "local peer record");

        let exchange = Arc::new(ExchangeService::new(
            substrate,
            store.clone(),
            local,
            config.exchange(),
            executor.clone(),
        ));
        let circuits = Arc::new(CircuitManager::new(
            store.clone(),
            config.policy(),
            local_peer_id,
        ));

        Ok(Self {
            config,
            store,
            exchange,
            circuits,
            countries,
            executor,
        })
    }

    /// Start every background task and return the sender the substrate
    /// reports reachable peers on.
    ///
    /// Runs the inbound responder, the discovery loop, circuit rotation and
    /// the periodic peer table log, and requests an exchange with every
    /// bootstrap peer.
    pub fn start(&self) -> eyre::Result<mpsc::Sender<PeerReachable>> {
        let incoming = self
            .exchange
            .listen()
            .wrap_err("failed to register exchange protocol")?;

        let exchange = self.exchange.clone();
        self.executor
            .spawn_with_graceful_shutdown_signal("exchange_inbound", |shutdown| {
                exchange.run_inbound(incoming, shutdown)
            });

        let (events_tx, events_rx) = mpsc::channel(REACHABLE_EVENTS_CAPACITY);
        let exchange = self.exchange.clone();
        self.executor
            .spawn_with_graceful_shutdown_signal("exchange_discovery", |shutdown| {
                exchange.run_discovery(events_rx, shutdown)
            });

        self.circuits
            .start_rotation(self.config.policy.circuit_rotation_interval, &self.executor);

        self.spawn_peer_table_log();

        for peer in self.config.bootstrap_peers()? {
            let peer_id = peer.peer_id;
            let outcome = self.exchange.peer_reachable(peer);
            debug!(%peer_id, ?outcome, "bootstrap peer");
        }

        info!(peer_id = %self.local_peer_id(), "node started");
        Ok(events_tx)
    }

    fn spawn_peer_table_log(&self) {
        let store = self.store.clone();
        let interval = self.config.network.peer_table_log_interval;
        self.executor
            .spawn_with_graceful_shutdown_signal("peer_table_log", move |shutdown| async move {
                let mut shutdown = std::pin::pin!(shutdown);
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        biased;
                        guard = &mut shutdown => {
                            drop(guard);
                            break;
                        }
                        _ = ticker.tick() => log_peer_table(&store),
                    }
                }
            });
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.exchange.local_peer_id()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PeerRecordStore> {
        &self.store
    }

    pub fn exchange(&self) -> &Arc<ExchangeService<S>> {
        &self.exchange
    }

    pub fn circuits(&self) -> &Arc<CircuitManager> {
        &self.circuits
    }

    /// The published circuit, if any build has succeeded yet.
    pub fn current_circuit(&self) -> Option<Arc<Circuit>> {
        self.circuits.current()
    }

    /// Build and publish a circuit now, outside the rotation schedule.
    pub fn build_circuit(&self) -> Result<Arc<Circuit>, CircuitError> {
        self.circuits.build_now()
    }

    /// Re-advertise with new listen addresses.
    pub fn update_listen_addrs(&self, listen_addrs: &[Multiaddr]) {
        let record = local_record(
            self.local_peer_id(),
            &self.config.local,
            listen_addrs,
            self.countries.as_deref(),
        );
        self.exchange.update_local_record(record);
    }
}

fn open_country_lookup(config: &LocalRecordConfig) -> Option<Arc<dyn CountryLookup>> {
    let path = config.geoip_database_path.as_ref()?;
    match GeoIp::open(path) {
        Ok(geoip) => Some(Arc::new(geoip)),
        Err(e) => {
            warn!("GeoIP country lookup disabled: {e:#}");
            None
        }
    }
}

fn log_peer_table(store: &PeerRecordStore) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let records = store.all();
    debug!(peers = records.len(), "peer table");
    for record in records {
        debug!(
            peer_id = %record.peer_id,
            address = %record.address,
            country_code = %record.country_code,
            bandwidth_score = record.bandwidth_score,
            exit = record.is_exit_capable,
            "known peer"
        );
    }
}
