use std::time::Duration;

use libp2p::PeerId;

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("Malformed record: {0}")]
    Malformed(#[from] MalformedRecord),
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// The remote sent something that is not a valid record for it.
#[derive(Debug, thiserror::Error)]
pub enum MalformedRecord {
    #[error(transparent)]
    Codec(CodecError),
    #[error("record for {claimed} received from {actual}")]
    PeerMismatch { claimed: String, actual: PeerId },
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The peer does not speak this protocol version.
    #[error("peer does not support {0}")]
    UnsupportedProtocol(String),
    #[error("failed to open stream: {0}")]
    Open(String),
    #[error("failed to accept streams: {0}")]
    Accept(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("stream closed before a record arrived")]
    Closed,
}

impl ExchangeError {
    /// Outcome label used for the `exchange_total` counter and log events.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Stream(_) => "stream_error",
        }
    }
}

impl From<CodecError> for ExchangeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => StreamError::Io(e).into(),
            other => MalformedRecord::Codec(other).into(),
        }
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err).into()
    }
}
