//! Peer metadata records and the store holding the latest one per peer.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::PeerRecord;
pub use store::PeerRecordStore;
