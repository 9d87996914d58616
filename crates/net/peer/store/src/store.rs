//! In-memory record store (does not persist across restarts).

use std::collections::HashMap;

use libp2p::PeerId;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::{PeerRecord, StoreError};

/// Latest known [`PeerRecord`] per peer.
///
/// Shared by every exchange task and by circuit selection. Writers are
/// mutually exclusive, readers run concurrently, and every lock is held only
/// for a single map operation.
#[derive(Debug, Default)]
pub struct PeerRecordStore {
    records: RwLock<HashMap<PeerId, PeerRecord>>,
}

impl PeerRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `record.peer_id`.
    ///
    /// Malformed identifiers are logged and dropped. Returns whether the record
    /// was stored.
    pub fn upsert(&self, record: PeerRecord) -> bool {
        match self.try_upsert(record) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "dropping peer record");
                false
            }
        }
    }

    /// Insert or replace the record, returning the record it replaced.
    pub fn try_upsert(&self, record: PeerRecord) -> Result<Option<PeerRecord>, StoreError> {
        let peer_id = record.parse_peer_id()?;
        trace!(%peer_id, "upserting peer record");
        Ok(self.records.write().insert(peer_id, record))
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<PeerRecord> {
        self.records.read().get(peer_id).cloned()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.records.read().contains_key(peer_id)
    }

    /// Independent copy of every record, in no particular order.
    pub fn all(&self) -> Vec<PeerRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn remove(&self, peer_id: &PeerId) -> Option<PeerRecord> {
        self.records.write().remove(peer_id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
