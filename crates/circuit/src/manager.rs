//! Publishing and rotating the active circuit.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use libp2p::PeerId;
use meshpath_net_peer_store::PeerRecordStore;
use meshpath_tasks::{GracefulShutdown, TaskExecutor};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{Circuit, CircuitError, Policy, select_circuit};

/// Owns the active [`Circuit`] and rebuilds it on demand or on a timer.
///
/// Readers get the published circuit through [`current`](Self::current)
/// without waiting on a build. A failed build leaves the published circuit
/// as it was.
#[derive(Debug)]
pub struct CircuitManager {
    store: Arc<PeerRecordStore>,
    policy: Policy,
    local_peer_id: PeerId,
    current: RwLock<Option<Arc<Circuit>>>,
    rng: Mutex<StdRng>,
    attempts: AtomicU64,
    published: AtomicU64,
}

impl CircuitManager {
    pub fn new(store: Arc<PeerRecordStore>, policy: Policy, local_peer_id: PeerId) -> Self {
        Self {
            store,
            policy,
            local_peer_id,
            current: RwLock::new(None),
            rng: Mutex::new(StdRng::from_os_rng()),
            attempts: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Replace the randomness source, e.g. with a seeded one.
    pub fn with_rng(self, rng: StdRng) -> Self {
        *self.rng.lock() = rng;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The published circuit, or `None` until a build has succeeded.
    pub fn current(&self) -> Option<Arc<Circuit>> {
        self.current.read().clone()
    }

    /// Number of builds attempted so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Select a circuit from the current store contents and publish it.
    ///
    /// Concurrent builds each publish in turn; the last to finish stays
    /// current.
    pub fn build_now(&self) -> Result<Arc<Circuit>, CircuitError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.store.all();
        let selected = {
            let mut rng = self.rng.lock();
            select_circuit(snapshot, &self.policy, &self.local_peer_id, &mut *rng)
        };

        let circuit = match selected {
            Ok(circuit) => circuit,
            Err(e) => {
                warn!(reason = e.reason(), error = %e, "circuit build failed");
                counter!("circuit_builds_total", "outcome" => e.reason()).increment(1);
                return Err(e);
            }
        };

        let circuit = {
            let mut current = self.current.write();
            let sequence = self.published.fetch_add(1, Ordering::Relaxed) + 1;
            let circuit = Arc::new(circuit.with_sequence(sequence));
            *current = Some(circuit.clone());
            circuit
        };

        info!(
            sequence = circuit.sequence(),
            hops = ?circuit.hops().iter().map(|h| h.peer_id.as_str()).collect::<Vec<_>>(),
            exit = %circuit.exit().peer_id,
            exit_country = %circuit.exit().country_code,
            "circuit built"
        );
        counter!("circuit_builds_total", "outcome" => "success").increment(1);
        Ok(circuit)
    }

    /// Rebuild the circuit every `interval` until shutdown.
    ///
    /// The first rebuild happens one interval after the call. A tick that
    /// falls due while a rebuild is still running is skipped.
    pub fn start_rotation(
        self: &Arc<Self>,
        interval: Duration,
        executor: &TaskExecutor,
    ) -> JoinHandle<()> {
        let this = self.clone();
        executor.spawn_with_graceful_shutdown_signal("circuit_rotation", move |shutdown| {
            this.run_rotation(interval, shutdown)
        })
    }

    async fn run_rotation(self: Arc<Self>, interval: Duration, mut shutdown: GracefulShutdown) {
        info!(?interval, "circuit rotation started");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let _guard = loop {
            tokio::select! {
                biased;
                guard = &mut shutdown => break guard,
                _ = ticker.tick() => {
                    debug!("rotating circuit");
                    counter!("circuit_rotations_total").increment(1);
                    // Failures are logged by `build_now`; the next tick retries.
                    let _ = self.build_now();
                }
            }
        };

        info!("circuit rotation stopped");
    }
}
