//! Wire types for the request/response exchange with the host compiler.
//!
//! A request is the already-parsed IDL: a parameter list and the annotated
//! structs. The response lists generated files or carries an error string.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A generation request as received on stdin or from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Flat `key=value` parameters.
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub structs: Vec<RawStruct>,
}

impl PluginRequest {
    /// Decodes a request from its JSON form.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A struct as described by the IDL, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStruct {
    pub name: String,
    pub package: String,
    /// Overrides the derived model import path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_import: Option<String>,
    #[serde(default)]
    pub fields: Vec<RawField>,
    /// Trait method signatures, e.g. `async fn by_title(&self, t: String) -> MongoResult<u64>;`
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub tag: String,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Result of a generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginResponse {
    pub contents: Vec<GeneratedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            contents: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fills_defaults() {
        let json = r#"{
            "structs": [{
                "name": "Video",
                "package": "video",
                "fields": [{"name": "title", "type": "String", "tag": "index=true"}]
            }]
        }"#;
        let request: PluginRequest = serde_json::from_str(json).unwrap();
        assert!(request.parameters.is_empty());
        assert_eq!(request.structs[0].fields[0].ty, "String");
        assert!(request.structs[0].methods.is_empty());
        assert!(request.structs[0].model_import.is_none());
    }

    #[test]
    fn malformed_request_is_json_error() {
        let err = PluginRequest::from_json("{\"structs\": 3}").unwrap_err();
        assert!(matches!(err, crate::RepogenError::Json(_)));
    }

    #[test]
    fn failure_response_omits_contents() {
        let json = serde_json::to_string(&PluginResponse::failure("boom")).unwrap();
        assert_eq!(json, r#"{"contents":[],"error":"boom"}"#);
    }
}
