//! HTTP endpoint contract shared by producer and consumer.

use serde::{Deserialize, Serialize};

/// Path of the streaming export endpoint.
pub const CONTENT_PATH: &str = "/content";

/// Path of the binary fetch endpoint.
pub const UPLOADFS_PATH: &str = "/uploadfs";

/// Public URL prefix of the binary store.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Content type of export stream bodies.
pub const STREAM_CONTENT_TYPE: &str = "application/vnd.contentsync.stream";

/// Authorization scheme carrying the API key.
pub const API_KEY_SCHEME: &str = "ApiKey";

/// Builds the `Authorization` header value for an API key.
pub fn authorization_value(api_key: &str) -> String {
    format!("{API_KEY_SCHEME} {api_key}")
}

/// Extracts the API key from an `Authorization` header value.
///
/// Returns `None` for other schemes or an empty key.
pub fn parse_api_key(header: &str) -> Option<&str> {
    let (scheme, key) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(API_KEY_SCHEME) {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

/// Query parameters of the export endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    /// Restricts the export to one document type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Also export documents joined from the selected ones.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub related: bool,
    /// Criteria for the source's query capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Restricts primary documents to one workflow locale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl ExportParams {
    /// Returns true if only one document type is exported.
    pub fn is_type_scoped(&self) -> bool {
        self.doc_type.is_some()
    }
}

/// Query parameters of the binary fetch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryFetchParams {
    /// Object path within the binary store.
    pub path: String,
    /// Whether the object is currently disabled on the source.
    #[serde(default)]
    pub disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_header_round_trip() {
        let header = authorization_value("s3cret");
        assert_eq!(header, "ApiKey s3cret");
        assert_eq!(parse_api_key(&header), Some("s3cret"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_keys() {
        assert_eq!(parse_api_key("Bearer s3cret"), None);
        assert_eq!(parse_api_key("ApiKey   "), None);
        assert_eq!(parse_api_key("ApiKey"), None);
        assert_eq!(parse_api_key("apikey k"), Some("k"));
    }

    #[test]
    fn export_params_type_scope() {
        assert!(!ExportParams::default().is_type_scoped());
        let params = ExportParams {
            doc_type: Some("article".into()),
            ..Default::default()
        };
        assert!(params.is_type_scoped());
    }

    #[test]
    fn export_params_skip_defaults_when_serialized() {
        let value = serde_json::to_value(ExportParams {
            doc_type: Some("article".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"type": "article"}));
    }
}
