//! Length-prefixed frame encoding.
//!
//! Every frame is a 4-byte big-endian payload length followed by a single
//! CBOR value. The decoder is incremental: bytes are fed in whatever chunk
//! sizes the transport delivers, and complete frames are drained one at a
//! time, so a stream of any length is consumed with a buffer no larger than
//! one frame plus one transport chunk.

use crate::cbor::{from_cbor, to_cbor};
use crate::error::{CodecError, CodecResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Size of the frame length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound on a single frame payload (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Encode a value as one length-prefixed CBOR frame.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded or its encoding does not
/// fit in a `u32` length prefix.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> CodecResult<Bytes> {
    let payload = to_cbor(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::encoding_failed(format!("payload of {} bytes exceeds u32", payload.len()))
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(len);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Incremental decoder for length-prefixed CBOR frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a decoder rejecting frames larger than `max_frame_len`.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Appends bytes received from the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes buffered but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Removes and returns the next complete frame payload, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] if the next header announces a
    /// payload above the configured limit.
    pub fn next_frame(&mut self) -> CodecResult<Option<Bytes>> {
        if self.buffer.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&self.buffer[..FRAME_HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        if self.buffer.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        self.buffer.advance(FRAME_HEADER_LEN);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Decodes the next complete frame into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is too large or its payload does not
    /// decode as `T`.
    pub fn decode_next<T: DeserializeOwned>(&mut self) -> CodecResult<Option<T>> {
        match self.next_frame()? {
            Some(payload) => from_cbor(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Checks that the input ended on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TruncatedFrame`] if bytes are left over.
    pub fn finish(&self) -> CodecResult<()> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TruncatedFrame {
                buffered: self.buffer.len(),
            })
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn header_carries_payload_length() {
        let frame = encode_frame(&json!({"a": 1})).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - FRAME_HEADER_LEN);
    }

    #[test]
    fn partial_header_yields_nothing() {
        let frame = encode_frame(&json!("hello")).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame[..2]);
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 2);
        assert!(decoder.finish().is_err());

        decoder.extend(&frame[2..]);
        let value: Value = decoder.decode_next().unwrap().unwrap();
        assert_eq!(value, json!("hello"));
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn oversized_frame_rejected() {
        let frame = encode_frame(&json!({"payload": "x".repeat(64)})).unwrap();
        let mut decoder = FrameDecoder::with_max_frame_len(16);
        decoder.extend(&frame);
        assert!(matches!(
            decoder.next_frame(),
            Err(CodecError::FrameTooLarge { max: 16, .. })
        ));
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut wire = Vec::new();
        for i in 0..3 {
            wire.extend_from_slice(&encode_frame(&json!({ "n": i })).unwrap());
        }

        let mut decoder = FrameDecoder::new();
        decoder.extend(&wire);
        for i in 0..3 {
            let value: Value = decoder.decode_next().unwrap().unwrap();
            assert_eq!(value["n"], json!(i));
        }
        assert!(decoder.decode_next::<Value>().unwrap().is_none());
    }

    proptest! {
        #[test]
        fn arbitrary_chunking_preserves_frames(
            words in prop::collection::vec("[a-z]{0,40}", 1..20),
            chunk in 1usize..17,
        ) {
            let mut wire = Vec::new();
            for w in &words {
                wire.extend_from_slice(&encode_frame(w).unwrap());
            }

            let mut decoder = FrameDecoder::new();
            let mut decoded: Vec<String> = Vec::new();
            for piece in wire.chunks(chunk) {
                decoder.extend(piece);
                while let Some(w) = decoder.decode_next::<String>().unwrap() {
                    decoded.push(w);
                }
            }

            prop_assert!(decoder.finish().is_ok());
            prop_assert_eq!(decoded, words);
        }
    }
}
