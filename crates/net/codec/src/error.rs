//! Codec error shared by all protocols.

/// Error from a [`ProtocolCodec`](crate::ProtocolCodec).
///
/// `D` carries the protocol-specific validation failures raised while
/// converting a decoded wire message into its protocol type.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolCodecError<D: std::error::Error + 'static> {
    /// Length prefix or protobuf payload could not be processed.
    #[error("framing error: {0}")]
    Framing(#[from] quick_protobuf_codec::Error),

    /// Underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message decoded but is invalid for the protocol.
    #[error(transparent)]
    Domain(D),
}

impl<D: std::error::Error + 'static> ProtocolCodecError<D> {
    /// Wrap a protocol-specific error.
    pub fn domain(err: impl Into<D>) -> Self {
        Self::Domain(err.into())
    }

    /// Returns the protocol-specific error, if this is one.
    pub fn as_domain(&self) -> Option<&D> {
        match self {
            Self::Domain(d) => Some(d),
            _ => None,
        }
    }
}
