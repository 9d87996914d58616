use meshpath_net_peer_store::PeerRecord;
use tokio::time::Instant;

/// A selected path: intermediate hops in order, then the exit.
///
/// Never modified after construction; rotation publishes a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    sequence: u64,
    hops: Vec<PeerRecord>,
    exit: PeerRecord,
    built_at: Instant,
}

impl Circuit {
    pub(crate) fn new(hops: Vec<PeerRecord>, exit: PeerRecord) -> Self {
        Self {
            sequence: 0,
            hops,
            exit,
            built_at: Instant::now(),
        }
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Position in the order circuits were published, starting at 1.
    /// Zero for a circuit that was never published.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn hops(&self) -> &[PeerRecord] {
        &self.hops
    }

    pub fn exit(&self) -> &PeerRecord {
        &self.exit
    }

    pub fn built_at(&self) -> Instant {
        self.built_at
    }

    /// Hop peer ids in order, followed by the exit's.
    pub fn peer_ids(&self) -> impl Iterator<Item = &str> {
        self.hops
            .iter()
            .chain(std::iter::once(&self.exit))
            .map(|r| r.peer_id.as_str())
    }
}
