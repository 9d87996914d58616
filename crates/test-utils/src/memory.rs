//! In-process substrate connecting any number of peers.

use std::{
    collections::{HashMap, HashSet},
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::{
    AsyncRead, AsyncWrite, TryStreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    stream::IntoAsyncRead,
};
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use meshpath_net_exchange::{ExchangeError, StreamError, Substrate};
use parking_lot::Mutex;

type Chunk = io::Result<Vec<u8>>;

/// One end of an in-memory byte stream.
///
/// Each direction is an unbounded channel, so writes never wait on the
/// reader. Closing or dropping one end ends the other end's reads.
pub struct MemoryStream {
    reader: IntoAsyncRead<UnboundedReceiver<Chunk>>,
    writer: UnboundedSender<Chunk>,
}

/// A connected pair of [`MemoryStream`]s.
pub fn memory_pipe() -> (MemoryStream, MemoryStream) {
    let (a_tx, a_rx) = mpsc::unbounded();
    let (b_tx, b_rx) = mpsc::unbounded();
    (
        MemoryStream {
            reader: b_rx.into_async_read(),
            writer: a_tx,
        },
        MemoryStream {
            reader: a_rx.into_async_read(),
            writer: b_tx,
        },
    )
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let result = self
            .writer
            .unbounded_send(Ok(buf.to_vec()))
            .map(|()| buf.len())
            .map_err(|_| io::ErrorKind::BrokenPipe.into());
        Poll::Ready(result)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.writer.close_channel();
        Poll::Ready(Ok(()))
    }
}

type Listener = UnboundedSender<(PeerId, MemoryStream)>;

#[derive(Default)]
struct NetworkState {
    peers: HashSet<PeerId>,
    listeners: HashMap<(PeerId, StreamProtocol), Listener>,
    /// Address hints each peer was given, keyed by the receiving peer.
    addresses: HashMap<PeerId, Vec<(PeerId, Multiaddr)>>,
}

/// Registry of in-memory peers and the protocols they accept.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as a fresh random peer.
    pub fn substrate(&self) -> MemorySubstrate {
        self.substrate_for(PeerId::random())
    }

    /// Join the network as `peer_id`.
    pub fn substrate_for(&self, peer_id: PeerId) -> MemorySubstrate {
        self.state.lock().peers.insert(peer_id);
        MemorySubstrate {
            local_peer_id: peer_id,
            network: self.clone(),
        }
    }

    /// Addresses handed to `peer_id`'s substrate, in arrival order.
    pub fn address_hints(&self, peer_id: &PeerId) -> Vec<(PeerId, Multiaddr)> {
        self.state
            .lock()
            .addresses
            .get(peer_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop `peer_id` and every protocol it accepts.
    pub fn disconnect(&self, peer_id: &PeerId) {
        let mut state = self.state.lock();
        state.peers.remove(peer_id);
        state.listeners.retain(|(peer, _), _| peer != peer_id);
    }
}

/// A peer on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemorySubstrate {
    local_peer_id: PeerId,
    network: MemoryNetwork,
}

#[async_trait]
impl Substrate for MemorySubstrate {
    type Stream = MemoryStream;
    type Incoming = UnboundedReceiver<(PeerId, MemoryStream)>;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    async fn open(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, ExchangeError> {
        let state = self.network.state.lock();
        if !state.peers.contains(&peer) {
            return Err(StreamError::Open(format!("unknown peer {peer}")).into());
        }
        let Some(listener) = state.listeners.get(&(peer, protocol.clone())) else {
            return Err(StreamError::UnsupportedProtocol(protocol.to_string()).into());
        };

        let (local, remote) = memory_pipe();
        listener
            .unbounded_send((self.local_peer_id, remote))
            .map_err(|_| StreamError::Open(format!("{peer} stopped accepting {protocol}")))?;
        Ok(local)
    }

    fn accept(&self, protocol: StreamProtocol) -> Result<Self::Incoming, ExchangeError> {
        let mut state = self.network.state.lock();
        let key = (self.local_peer_id, protocol);
        if state.listeners.get(&key).is_some_and(|l| !l.is_closed()) {
            return Err(StreamError::Accept(format!("{} already registered", key.1)).into());
        }

        let (tx, rx) = mpsc::unbounded();
        state.listeners.insert(key, tx);
        Ok(rx)
    }

    fn add_address(&self, peer: PeerId, address: Multiaddr) {
        self.network
            .state
            .lock()
            .addresses
            .entry(self.local_peer_id)
            .or_default()
            .push((peer, address));
    }
}
