//! Wire conversion and validation for [`PeerRecord`].

use meshpath_net_codec::{ProtocolCodec, ProtocolCodecError};
use meshpath_net_peer_store::PeerRecord;

use crate::proto;

/// Maximum encoded record size in bytes.
pub const MAX_RECORD_SIZE: usize = 4096;
/// Maximum length of the address hint in bytes.
pub const MAX_ADDRESS_LEN: usize = 256;
/// Maximum length of the country code in characters.
pub const MAX_COUNTRY_CODE_LEN: usize = 2;

/// Record-level validation failures.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Required field missing from message.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Field exceeds maximum allowed length.
    #[error("{0} exceeds max length {1}, got {2}")]
    FieldLengthExceeded(&'static str, usize, usize),

    /// Bandwidth score is negative or not a finite number.
    #[error("invalid bandwidth score: {0}")]
    InvalidBandwidthScore(f64),
}

pub type CodecError = ProtocolCodecError<RecordError>;

/// Length-delimited codec carrying one [`PeerRecord`] per frame.
pub type RecordCodec = ProtocolCodec<proto::exchange::PeerRecord, PeerRecord, CodecError>;

impl From<PeerRecord> for proto::exchange::PeerRecord {
    fn from(record: PeerRecord) -> Self {
        proto::exchange::PeerRecord {
            peer_id: record.peer_id,
            address: record.address,
            country_code: record.country_code,
            bandwidth_score: record.bandwidth_score,
            is_exit_capable: record.is_exit_capable,
        }
    }
}

impl TryFrom<proto::exchange::PeerRecord> for PeerRecord {
    type Error = CodecError;

    fn try_from(value: proto::exchange::PeerRecord) -> Result<Self, Self::Error> {
        if value.peer_id.is_empty() {
            return Err(CodecError::domain(RecordError::MissingField("peer_id")));
        }

        if value.address.len() > MAX_ADDRESS_LEN {
            return Err(CodecError::domain(RecordError::FieldLengthExceeded(
                "address",
                MAX_ADDRESS_LEN,
                value.address.len(),
            )));
        }

        let country_len = value.country_code.chars().count();
        if country_len > MAX_COUNTRY_CODE_LEN {
            return Err(CodecError::domain(RecordError::FieldLengthExceeded(
                "country_code",
                MAX_COUNTRY_CODE_LEN,
                country_len,
            )));
        }

        if !value.bandwidth_score.is_finite() || value.bandwidth_score < 0.0 {
            return Err(CodecError::domain(RecordError::InvalidBandwidthScore(
                value.bandwidth_score,
            )));
        }

        Ok(PeerRecord {
            peer_id: value.peer_id,
            address: value.address,
            country_code: value.country_code,
            bandwidth_score: value.bandwidth_score,
            is_exit_capable: value.is_exit_capable,
        })
    }
}
