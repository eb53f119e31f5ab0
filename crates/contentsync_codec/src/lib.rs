//! # ContentSync Codec
//!
//! CBOR frame codec for the ContentSync wire format.
//!
//! This crate provides:
//! - CBOR serialization of any `serde` value
//! - Length-prefixed framing for streams of values
//! - An incremental [`FrameDecoder`] that works on arbitrary chunk boundaries
//!
//! ## Usage
//!
//! ```
//! use contentsync_codec::{encode_frame, FrameDecoder};
//!
//! let frame = encode_frame(&"hello").unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.extend(&frame);
//! let value: String = decoder.decode_next().unwrap().unwrap();
//! assert_eq!(value, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod frame;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use frame::{encode_frame, FrameDecoder, DEFAULT_MAX_FRAME_LEN, FRAME_HEADER_LEN};
