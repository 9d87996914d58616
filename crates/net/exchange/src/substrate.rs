//! The peer-to-peer layer exchanges run on.
//!
//! The exchange only needs a few things from the network: its own identity, a
//! way to open a stream to a peer on a protocol, the stream of inbound
//! requests for that protocol, and somewhere to leave addresses learned for a
//! peer. [`StreamSubstrate`] provides them on top of a libp2p swarm running
//! the `libp2p_stream` behaviour.

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Stream};
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use libp2p_stream::{Control, IncomingStreams, OpenStreamError};
use tokio::sync::mpsc;
use tracing::trace;

use crate::{ExchangeError, StreamError};

#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    type Incoming: Stream<Item = (PeerId, Self::Stream)> + Unpin + Send + 'static;

    fn local_peer_id(&self) -> PeerId;

    /// Open a new stream to `peer` negotiating `protocol`.
    async fn open(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, ExchangeError>;

    /// Register as the handler of inbound streams for `protocol`.
    fn accept(&self, protocol: StreamProtocol) -> Result<Self::Incoming, ExchangeError>;

    /// Remember `address` as a way to reach `peer`, so a later
    /// [`open`](Self::open) can dial it.
    fn add_address(&self, peer: PeerId, address: Multiaddr);
}

/// A peer the substrate has made contact with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReachable {
    pub peer_id: PeerId,
    /// Address the peer was reached on, when the substrate knows it.
    pub address: Option<Multiaddr>,
}

impl PeerReachable {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Multiaddr) -> Self {
        self.address = Some(address);
        self
    }
}

/// Addresses handed to [`StreamSubstrate::add_address`], for the swarm owner
/// to pass on to `Swarm::add_peer_address`.
pub type AddressHints = mpsc::UnboundedReceiver<(PeerId, Multiaddr)>;

/// [`Substrate`] over a libp2p swarm with the `libp2p_stream` behaviour.
///
/// `libp2p_stream` dials peers by id alone, so the swarm must already know an
/// address for them. The owner of the swarm drains the [`AddressHints`]
/// returned by [`new`](Self::new) into `Swarm::add_peer_address`.
#[derive(Clone)]
pub struct StreamSubstrate {
    local_peer_id: PeerId,
    control: Control,
    addresses: mpsc::UnboundedSender<(PeerId, Multiaddr)>,
}

impl StreamSubstrate {
    pub fn new(local_peer_id: PeerId, control: Control) -> (Self, AddressHints) {
        let (addresses, hints) = mpsc::unbounded_channel();
        let substrate = Self {
            local_peer_id,
            control,
            addresses,
        };
        (substrate, hints)
    }
}

#[async_trait]
impl Substrate for StreamSubstrate {
    type Stream = libp2p::Stream;
    type Incoming = IncomingStreams;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn open(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, ExchangeError> {
        let mut control = self.control.clone();
        control
            .open_stream(peer, protocol)
            .await
            .map_err(|e| match e {
                OpenStreamError::UnsupportedProtocol(p) => {
                    StreamError::UnsupportedProtocol(p.to_string())
                }
                OpenStreamError::Io(e) => StreamError::Io(e),
                other => StreamError::Open(other.to_string()),
            }
            .into())
    }

    fn accept(&self, protocol: StreamProtocol) -> Result<Self::Incoming, ExchangeError> {
        let mut control = self.control.clone();
        control
            .accept(protocol)
            .map_err(|e| StreamError::Accept(e.to_string()).into())
    }

    fn add_address(&self, peer: PeerId, address: Multiaddr) {
        if self.addresses.send((peer, address)).is_err() {
            trace!(peer_id = %peer, "address hints no longer consumed");
        }
    }
}
