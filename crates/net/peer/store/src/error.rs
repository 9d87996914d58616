use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid peer identifier {peer_id:?}: {reason}")]
    InvalidPeerIdentifier { peer_id: String, reason: String },
}
