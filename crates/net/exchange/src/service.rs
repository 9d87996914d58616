//! Drives record exchanges for a node.
//!
//! [`ExchangeService`] owns the outbound side (one exchange per reachable
//! peer, deduplicated by peer id) and the inbound side (one responder per
//! accepted stream). Both sides share one concurrency limit and one timeout.

use std::{collections::HashSet, sync::Arc};

use futures::StreamExt;
use libp2p::PeerId;
use meshpath_net_peer_store::{PeerRecord, PeerRecordStore};
use meshpath_tasks::{GracefulShutdown, TaskExecutor};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, trace, warn};

use crate::{
    ExchangeConfig, ExchangeError, PROTOCOL, PeerReachable, Substrate,
    protocol::{initiate, respond},
};

/// What [`ExchangeService::request`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeRequest {
    /// An exchange task was spawned.
    Started,
    /// A record for the peer is already stored and `force` was not set.
    AlreadyKnown,
    /// An exchange with the peer is already queued or running.
    InFlight,
    /// The peer is this node.
    LocalPeer,
}

pub struct ExchangeService<S: Substrate> {
    substrate: S,
    store: Arc<PeerRecordStore>,
    local_record: RwLock<PeerRecord>,
    config: ExchangeConfig,
    in_flight: Arc<Mutex<HashSet<PeerId>>>,
    permits: Arc<Semaphore>,
    executor: TaskExecutor,
}

impl<S: Substrate> ExchangeService<S> {
    pub fn new(
        substrate: S,
        store: Arc<PeerRecordStore>,
        local_record: PeerRecord,
        config: ExchangeConfig,
        executor: TaskExecutor,
    ) -> Self {
        Self {
            substrate,
            store,
            local_record: RwLock::new(local_record),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            in_flight: Arc::default(),
            executor,
        }
    }

    pub fn store(&self) -> &Arc<PeerRecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.substrate.local_peer_id()
    }

    /// The record sent to peers in every exchange.
    pub fn local_record(&self) -> PeerRecord {
        self.local_record.read().clone()
    }

    /// Replace the advertised record. Exchanges already running keep the old one.
    pub fn update_local_record(&self, record: PeerRecord) {
        *self.local_record.write() = record;
    }

    /// Number of outbound exchanges queued or running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Run one outbound exchange with `peer` and wait for its outcome.
    ///
    /// Opening the stream and the exchange itself share one timeout. The
    /// remote record is stored only when the whole exchange succeeded.
    pub async fn exchange_with(&self, peer: PeerId) -> Result<PeerRecord, ExchangeError> {
        let local = self.local_record();
        let result = tokio::time::timeout(self.config.timeout, async {
            let stream = self.substrate.open(peer, PROTOCOL).await?;
            initiate(stream, peer, local, &self.store).await
        })
        .await
        .unwrap_or_else(|_| Err(ExchangeError::Timeout(self.config.timeout)));

        record_outcome("outbound", &peer, &result);
        result
    }

    /// Answer an exchange `peer` opened on `stream`.
    pub async fn respond_to(
        &self,
        peer: PeerId,
        stream: S::Stream,
    ) -> Result<PeerRecord, ExchangeError> {
        let local = self.local_record();
        let result = tokio::time::timeout(
            self.config.timeout,
            respond(stream, peer, local, &self.store),
        )
        .await
        .unwrap_or_else(|_| Err(ExchangeError::Timeout(self.config.timeout)));

        record_outcome("inbound", &peer, &result);
        result
    }

    /// Schedule an exchange with `peer` in the background.
    ///
    /// Peers with a stored record are skipped unless `force` is set. A peer
    /// is never exchanged with twice at the same time.
    pub fn request(self: &Arc<Self>, peer: PeerId, force: bool) -> ExchangeRequest {
        if peer == self.substrate.local_peer_id() {
            return ExchangeRequest::LocalPeer;
        }
        if !force && self.store.contains(&peer) {
            return ExchangeRequest::AlreadyKnown;
        }
        let Some(guard) = InFlightGuard::try_new(&self.in_flight, peer) else {
            return ExchangeRequest::InFlight;
        };

        let this = self.clone();
        self.executor.spawn("exchange", async move {
            let _guard = guard;
            let Ok(_permit) = this.permits.clone().acquire_owned().await else {
                return;
            };
            // Outcome is logged and counted by `exchange_with`.
            let _ = this.exchange_with(peer).await;
        });

        ExchangeRequest::Started
    }

    /// Handle a reachability event: pass its address on to the substrate and
    /// request an exchange unless the peer is already known.
    pub fn peer_reachable(self: &Arc<Self>, event: PeerReachable) -> ExchangeRequest {
        let PeerReachable { peer_id, address } = event;
        if let Some(address) = address.clone()
            && peer_id != self.substrate.local_peer_id()
        {
            self.substrate.add_address(peer_id, address);
        }

        let outcome = self.request(peer_id, false);
        trace!(%peer_id, ?address, ?outcome, "peer reachable");
        outcome
    }

    /// Register as the inbound handler for [`PROTOCOL`].
    pub fn listen(&self) -> Result<S::Incoming, ExchangeError> {
        self.substrate.accept(PROTOCOL)
    }

    /// Request an exchange for every reachable peer until shutdown or until
    /// the event channel closes.
    pub async fn run_discovery(
        self: Arc<Self>,
        mut events: mpsc::Receiver<PeerReachable>,
        mut shutdown: GracefulShutdown,
    ) {
        info!("exchange discovery started");
        let _guard = loop {
            tokio::select! {
                biased;
                guard = &mut shutdown => break Some(guard),
                event = events.recv() => match event {
                    Some(event) => {
                        self.peer_reachable(event);
                    }
                    None => break None,
                },
            }
        };
        info!("exchange discovery stopped");
    }

    /// Serve inbound exchanges until shutdown or until `incoming` ends.
    ///
    /// Streams arriving while every permit is taken are dropped, which the
    /// remote sees as a closed stream.
    pub async fn run_inbound(
        self: Arc<Self>,
        mut incoming: S::Incoming,
        mut shutdown: GracefulShutdown,
    ) {
        info!(protocol = %PROTOCOL, "exchange responder started");
        let _guard = loop {
            tokio::select! {
                biased;
                guard = &mut shutdown => break Some(guard),
                next = incoming.next() => match next {
                    Some((peer, stream)) => self.spawn_responder(peer, stream),
                    None => break None,
                },
            }
        };
        info!("exchange responder stopped");
    }

    fn spawn_responder(self: &Arc<Self>, peer: PeerId, stream: S::Stream) {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            debug!(peer_id = %peer, "at exchange capacity, dropping inbound stream");
            counter!("exchange_total", "direction" => "inbound", "outcome" => "rejected")
                .increment(1);
            return;
        };

        let this = self.clone();
        self.executor.spawn("exchange-inbound", async move {
            let _permit = permit;
            let _ = this.respond_to(peer, stream).await;
        });
    }
}

fn record_outcome(
    direction: &'static str,
    peer: &PeerId,
    result: &Result<PeerRecord, ExchangeError>,
) {
    let outcome = match result {
        Ok(record) => {
            info!(
                peer_id = %peer,
                direction,
                country_code = %record.country_code,
                exit = record.is_exit_capable,
                "peer record exchanged"
            );
            "success"
        }
        Err(e @ ExchangeError::Malformed(_)) => {
            warn!(peer_id = %peer, direction, error = %e, "exchange failed");
            e.reason()
        }
        Err(e) => {
            debug!(peer_id = %peer, direction, error = %e, "exchange failed");
            e.reason()
        }
    };
    counter!("exchange_total", "direction" => direction, "outcome" => outcome).increment(1);
}

/// Membership in the in-flight set, released on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<PeerId>>>,
    peer: PeerId,
}

impl InFlightGuard {
    fn try_new(set: &Arc<Mutex<HashSet<PeerId>>>, peer: PeerId) -> Option<Self> {
        set.lock().insert(peer).then(|| Self {
            set: set.clone(),
            peer,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard() {
        let set = Arc::default();
        let peer = PeerId::random();

        let guard = InFlightGuard::try_new(&set, peer).unwrap();
        assert!(InFlightGuard::try_new(&set, peer).is_none());
        assert!(InFlightGuard::try_new(&set, PeerId::random()).is_some());

        drop(guard);
        assert!(set.lock().is_empty());
        assert!(InFlightGuard::try_new(&set, peer).is_some());
    }
}
