//! Protocol error types.

use contentsync_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while reading an export stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame could not be decoded.
    #[error("malformed frame: {0}")]
    Codec(#[from] CodecError),

    /// The first frame was not a version marker.
    #[error("stream does not start with a version marker")]
    MissingMarker,

    /// The marker announced a version this reader cannot handle.
    #[error("unsupported protocol version {version} (supported: {supported})")]
    UnsupportedVersion {
        /// Version announced by the peer.
        version: u32,
        /// Version supported locally.
        supported: u32,
    },

    /// A second marker appeared mid-stream.
    #[error("unexpected version marker after stream start")]
    UnexpectedMarker,

    /// Data arrived after the end marker.
    #[error("data received after end marker")]
    FramesAfterEnd,

    /// The transport closed before the end marker.
    #[error("stream closed without end marker after {records} records")]
    Incomplete {
        /// Records received before the stream stopped.
        records: u64,
    },
}

impl ProtocolError {
    /// Returns true if the stream was cut short rather than malformed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::Incomplete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_is_distinct() {
        assert!(ProtocolError::Incomplete { records: 2 }.is_incomplete());
        assert!(!ProtocolError::MissingMarker.is_incomplete());
        assert!(ProtocolError::UnsupportedVersion {
            version: 9,
            supported: 1
        }
        .to_string()
        .contains('9'));
    }
}
