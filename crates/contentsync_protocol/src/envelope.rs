//! The stream envelope.

use bytes::Bytes;
use contentsync_codec::{encode_frame, CodecResult};
use contentsync_core::Document;
use serde::{Deserialize, Serialize};

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// One frame of an export stream.
///
/// A stream is `Marker`, any number of `Record`s, then `End`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// Opens the stream and announces the protocol version.
    Marker {
        /// Protocol version of the producer.
        version: u32,
    },
    /// A record of a collection.
    Record {
        /// Source collection name.
        collection: String,
        /// The record itself.
        doc: Document,
    },
    /// Terminates the stream.
    End,
}

impl Envelope {
    /// The marker for the current protocol version.
    pub fn marker() -> Self {
        Envelope::Marker {
            version: PROTOCOL_VERSION,
        }
    }

    /// A record envelope.
    pub fn record(collection: impl Into<String>, doc: Document) -> Self {
        Envelope::Record {
            collection: collection.into(),
            doc,
        }
    }

    /// Encodes into one length-prefixed CBOR frame.
    ///
    /// # Errors
    ///
    /// Returns a codec error if serialization fails.
    pub fn to_frame(&self) -> CodecResult<Bytes> {
        encode_frame(self)
    }
}
