//! One record exchange over an already-open stream.
//!
//! The exchange is half-duplex: the initiator writes its record first and the
//! responder answers only after it has read and stored the initiator's. Each
//! side reads exactly one frame, so neither side ever waits on a write that the
//! other has not started reading.

use asynchronous_codec::Framed;
use futures::{AsyncRead, AsyncWrite, SinkExt, TryStreamExt};
use libp2p::PeerId;
use meshpath_net_peer_store::{PeerRecord, PeerRecordStore};
use tracing::{debug, trace};

use crate::{ExchangeError, MAX_RECORD_SIZE, MalformedRecord, RecordCodec, StreamError};

/// Framed record stream bound to the peer on the other end.
pub struct RecordStream<S> {
    framed: Framed<S, RecordCodec>,
    remote: PeerId,
}

impl<S> RecordStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, remote: PeerId) -> Self {
        Self {
            framed: Framed::new(stream, RecordCodec::new(MAX_RECORD_SIZE)),
            remote,
        }
    }

    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    pub async fn send(&mut self, record: PeerRecord) -> Result<(), ExchangeError> {
        trace!(peer_id = %self.remote, "sending peer record");
        self.framed.send(record).await?;
        Ok(())
    }

    /// Read one record and check it describes the peer that sent it.
    pub async fn receive(&mut self) -> Result<PeerRecord, ExchangeError> {
        let record = self
            .framed
            .try_next()
            .await?
            .ok_or(StreamError::Closed)?;

        if !record.is_for(&self.remote) {
            return Err(MalformedRecord::PeerMismatch {
                claimed: record.peer_id,
                actual: self.remote,
            }
            .into());
        }

        trace!(peer_id = %self.remote, "received peer record");
        Ok(record)
    }

    /// Close the write side. Both records are already through by the time
    /// this is called, so a failure here does not affect the exchange.
    pub async fn close(mut self) {
        if let Err(e) = self.framed.close().await {
            trace!(peer_id = %self.remote, error = %e, "error closing exchange stream");
        }
    }
}

/// Outbound side: send `local`, then read and store the remote record.
pub async fn initiate<S>(
    stream: S,
    remote: PeerId,
    local: PeerRecord,
    store: &PeerRecordStore,
) -> Result<PeerRecord, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = RecordStream::new(stream, remote);

    stream.send(local).await?;
    let record = stream.receive().await?;
    stream.close().await;

    store.upsert(record.clone());
    debug!(peer_id = %remote, "outbound exchange complete");
    Ok(record)
}

/// Inbound side: read and store the remote record, then answer with `local`.
pub async fn respond<S>(
    stream: S,
    remote: PeerId,
    local: PeerRecord,
    store: &PeerRecordStore,
) -> Result<PeerRecord, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = RecordStream::new(stream, remote);

    let record = stream.receive().await?;
    store.upsert(record.clone());

    stream.send(local).await?;
    stream.close().await;

    debug!(peer_id = %remote, "inbound exchange complete");
    Ok(record)
}
