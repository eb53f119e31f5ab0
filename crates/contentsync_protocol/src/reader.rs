//! Incremental, validating reader for export streams.
//!
//! The transport feeds raw body chunks in with [`EnvelopeReader::extend`]
//! and pulls decoded events out with [`EnvelopeReader::next_event`]. The
//! reader enforces the stream grammar: a supported version marker first,
//! records next, an end marker last and nothing after it.

use crate::envelope::{Envelope, PROTOCOL_VERSION};
use crate::error::{ProtocolError, ProtocolResult};
use contentsync_codec::FrameDecoder;
use contentsync_core::Document;

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The stream opened with a supported version.
    Started {
        /// Announced protocol version.
        version: u32,
    },
    /// A record arrived.
    Record {
        /// Source collection name.
        collection: String,
        /// The record.
        doc: Document,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingMarker,
    Streaming,
    Ended,
}

/// Validating envelope reader over a chunked byte stream.
#[derive(Debug)]
pub struct EnvelopeReader {
    decoder: FrameDecoder,
    state: State,
    records: u64,
}

impl Default for EnvelopeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeReader {
    /// Creates a reader with the default frame size limit.
    pub fn new() -> Self {
        Self::with_decoder(FrameDecoder::new())
    }

    /// Creates a reader over a custom frame decoder.
    pub fn with_decoder(decoder: FrameDecoder) -> Self {
        Self {
            decoder,
            state: State::AwaitingMarker,
            records: 0,
        }
    }

    /// Buffers a chunk received from the transport.
    ///
    /// # Errors
    ///
    /// Returns `FramesAfterEnd` if non-empty data arrives after the end
    /// marker.
    pub fn extend(&mut self, chunk: &[u8]) -> ProtocolResult<()> {
        if self.state == State::Ended && !chunk.is_empty() {
            return Err(ProtocolError::FramesAfterEnd);
        }
        self.decoder.extend(chunk);
        Ok(())
    }

    /// Returns the next event, or `None` when more data is needed or the
    /// end marker has been read.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on malformed frames or grammar violations.
    pub fn next_event(&mut self) -> ProtocolResult<Option<StreamEvent>> {
        loop {
            if self.state == State::Ended {
                if self.decoder.buffered() > 0 {
                    return Err(ProtocolError::FramesAfterEnd);
                }
                return Ok(None);
            }

            let Some(envelope) = self.decoder.decode_next::<Envelope>()? else {
                return Ok(None);
            };

            match (self.state, envelope) {
                (State::AwaitingMarker, Envelope::Marker { version }) => {
                    if version != PROTOCOL_VERSION {
                        return Err(ProtocolError::UnsupportedVersion {
                            version,
                            supported: PROTOCOL_VERSION,
                        });
                    }
                    self.state = State::Streaming;
                    return Ok(Some(StreamEvent::Started { version }));
                }
                (State::AwaitingMarker, _) => return Err(ProtocolError::MissingMarker),
                (State::Streaming, Envelope::Marker { .. }) => {
                    return Err(ProtocolError::UnexpectedMarker)
                }
                (State::Streaming, Envelope::Record { collection, doc }) => {
                    self.records += 1;
                    return Ok(Some(StreamEvent::Record { collection, doc }));
                }
                (State::Streaming, Envelope::End) => {
                    self.state = State::Ended;
                }
                (State::Ended, _) => return Err(ProtocolError::FramesAfterEnd),
            }
        }
    }

    /// Returns true once the end marker has been read.
    pub fn is_finished(&self) -> bool {
        self.state == State::Ended
    }

    /// Number of records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Validates the stream at transport close.
    ///
    /// # Errors
    ///
    /// Returns `Incomplete` if the end marker never arrived, `MissingMarker`
    /// if nothing at all arrived, or `FramesAfterEnd` if trailing bytes
    /// remain.
    pub fn finish(&self) -> ProtocolResult<()> {
        match self.state {
            State::Ended if self.decoder.buffered() > 0 => Err(ProtocolError::FramesAfterEnd),
            State::Ended => Ok(()),
            State::AwaitingMarker if self.decoder.buffered() == 0 => {
                Err(ProtocolError::MissingMarker)
            }
            _ => Err(ProtocolError::Incomplete {
                records: self.records,
            }),
        }
    }
}
