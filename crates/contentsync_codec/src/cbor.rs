//! CBOR serialization helpers.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a serializable value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be represented in CBOR.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or do not match `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_document_survives_cbor() {
        let doc = json!({
            "_id": "a1",
            "type": "article",
            "rank": 3,
            "score": 4.5,
            "tags": ["x", "y"],
            "meta": { "draft": false, "owner": null }
        });

        let bytes = to_cbor(&doc).unwrap();
        let decoded: serde_json::Value = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn garbage_is_rejected() {
        let result: CodecResult<serde_json::Value> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
