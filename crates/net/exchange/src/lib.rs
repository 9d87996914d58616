//! Peer record exchange.
//!
//! Two peers swap their self-reported [`PeerRecord`]s over a single stream
//! negotiated on [`PROTOCOL`], and each stores the other's record in its
//! [`PeerRecordStore`](meshpath_net_peer_store::PeerRecordStore). The
//! [`ExchangeService`] decides when to exchange and with whom.

use libp2p::StreamProtocol;

mod codec;
mod config;
mod error;
mod protocol;
mod service;
mod substrate;

#[allow(unreachable_pub)]
mod proto {
    include!(concat!(env!("OUT_DIR"), "/proto/mod.rs"));
}

pub use codec::{
    CodecError, MAX_ADDRESS_LEN, MAX_COUNTRY_CODE_LEN, MAX_RECORD_SIZE, RecordCodec, RecordError,
};
pub use config::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_MAX_CONCURRENT_EXCHANGES, ExchangeConfig};
pub use error::{ExchangeError, MalformedRecord, StreamError};
pub use meshpath_net_peer_store::PeerRecord;
pub use protocol::{RecordStream, initiate, respond};
pub use service::{ExchangeRequest, ExchangeService};
pub use substrate::{AddressHints, PeerReachable, StreamSubstrate, Substrate};

/// Protocol the exchange is negotiated on. The major version changes only
/// with incompatible wire changes, and peers on different majors fail to
/// negotiate rather than misread each other.
pub const PROTOCOL: StreamProtocol = StreamProtocol::new("/meshpath/peer-record/1.0.0");
