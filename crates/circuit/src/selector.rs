//! Picking an exit and intermediate hops from a store snapshot.

use libp2p::PeerId;
use meshpath_net_peer_store::PeerRecord;
use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};

use crate::{Circuit, CircuitError, Policy};

/// Select a circuit from `records` under `policy`.
///
/// The local peer never appears in the result. The exit is drawn uniformly
/// from the exit candidates and the hops uniformly, without replacement, from
/// every other remote peer. `bandwidth_score` does not weight either draw.
///
/// Exit candidates are the exit-capable peers, narrowed to
/// `policy.exit_country` when one is set. An unmet country filter fails the
/// build; with no filter and no exit-capable peer, every peer is a candidate.
pub fn select_circuit<R: Rng + ?Sized>(
    records: Vec<PeerRecord>,
    policy: &Policy,
    local: &PeerId,
    rng: &mut R,
) -> Result<Circuit, CircuitError> {
    let peers: Vec<PeerRecord> = records.into_iter().filter(|r| !r.is_for(local)).collect();

    let required = policy.required_peers();
    if peers.len() < required {
        return Err(CircuitError::InsufficientPeers {
            available: peers.len(),
            required,
        });
    }

    let exit_capable: Vec<&PeerRecord> = peers.iter().filter(|r| r.is_exit_capable).collect();
    let candidates: Vec<&PeerRecord> = match policy.exit_country() {
        Some(country) => exit_capable
            .into_iter()
            .filter(|r| r.country_code == country)
            .collect(),
        None if exit_capable.is_empty() => peers.iter().collect(),
        None => exit_capable,
    };

    let Some(exit) = candidates.choose(rng).map(|r| (*r).clone()) else {
        return Err(CircuitError::NoSuitableExit {
            country: policy.exit_country().map(str::to_owned),
        });
    };

    let mut intermediates: Vec<&PeerRecord> = peers
        .iter()
        .filter(|r| r.peer_id != exit.peer_id)
        .collect();
    if intermediates.len() < policy.hop_count {
        return Err(CircuitError::InsufficientHops {
            available: intermediates.len(),
            required: policy.hop_count,
        });
    }

    intermediates.shuffle(rng);
    let hops = intermediates
        .into_iter()
        .take(policy.hop_count)
        .cloned()
        .collect();

    Ok(Circuit::new(hops, exit))
}
