//! Ready-made peer records.

use libp2p::PeerId;
use meshpath_net_peer_store::PeerRecord;

/// A non-exit record for `peer` with a loopback address hint.
pub fn record(peer: PeerId) -> PeerRecord {
    PeerRecord::from(peer)
        .with_address("/ip4/127.0.0.1/tcp/4001")
        .with_bandwidth_score(1.0)
}

/// An exit-capable record for `peer` located in `country`.
pub fn exit_record(peer: PeerId, country: &str) -> PeerRecord {
    record(peer)
        .with_country_code(country)
        .with_exit_capable(true)
}

/// `n` fresh random peer ids.
pub fn peers(n: usize) -> Vec<PeerId> {
    (0..n).map(|_| PeerId::random()).collect()
}
