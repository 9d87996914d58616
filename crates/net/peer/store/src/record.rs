//! Self-reported peer metadata.

use std::str::FromStr;

use libp2p::PeerId;

use crate::StoreError;

/// Metadata a peer advertises about itself.
///
/// Everything except `peer_id` is self-reported and unverified. A record is
/// always replaced as a whole; fields are never merged across exchanges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerRecord {
    /// Substrate peer identifier in its string form.
    pub peer_id: String,
    /// Best-known reachable address hint. Informational only.
    pub address: String,
    /// Two-letter country code, or empty when unknown.
    pub country_code: String,
    /// Non-negative capability hint.
    pub bandwidth_score: f64,
    /// Willing to terminate circuits.
    pub is_exit_capable: bool,
}

impl PeerRecord {
    /// Create a record for `peer_id` with every other field empty.
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn with_bandwidth_score(mut self, bandwidth_score: f64) -> Self {
        self.bandwidth_score = bandwidth_score;
        self
    }

    pub fn with_exit_capable(mut self, is_exit_capable: bool) -> Self {
        self.is_exit_capable = is_exit_capable;
        self
    }

    /// Parse `peer_id` into the substrate's native identifier.
    pub fn parse_peer_id(&self) -> Result<PeerId, StoreError> {
        if self.peer_id.is_empty() {
            return Err(StoreError::InvalidPeerIdentifier {
                peer_id: String::new(),
                reason: "empty identifier".to_string(),
            });
        }

        PeerId::from_str(&self.peer_id).map_err(|e| StoreError::InvalidPeerIdentifier {
            peer_id: self.peer_id.clone(),
            reason: e.to_string(),
        })
    }

    /// Whether this record belongs to `peer`.
    pub fn is_for(&self, peer: &PeerId) -> bool {
        self.peer_id == peer.to_base58()
    }
}

impl From<PeerId> for PeerRecord {
    fn from(peer_id: PeerId) -> Self {
        Self::new(peer_id.to_base58())
    }
}
