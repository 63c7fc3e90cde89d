//! Envelope configuration surface.
//!
//! Deserializable from TOML/JSON fragments; every field has a default so a
//! missing or empty configuration yields the stock behavior. Field names
//! accept both snake_case and the camelCase spelling used by the system this
//! library descends from.

use serde::Deserialize;

/// Configuration for the envelope wire shape and placement policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnvelopeProperties {
    /// Business code reported for success.
    #[serde(alias = "successCode")]
    pub success_code: i32,
    /// Message reported for success.
    #[serde(alias = "successMessage")]
    pub success_message: String,
    /// Business code reported when the wrapped value is absent.
    #[serde(alias = "notFoundCode")]
    pub not_found_code: i32,
    /// Message reported when the wrapped value is absent.
    #[serde(alias = "notFoundMessage")]
    pub not_found_message: String,
    /// Wire name of the payload field.
    #[serde(alias = "resultFieldName")]
    pub result_field_name: String,
    /// Wire name of the business code field.
    #[serde(alias = "codeFieldName")]
    pub code_field_name: String,
    /// Wire name of the message field.
    #[serde(alias = "messageFieldName")]
    pub message_field_name: String,
    /// Placement policy switch: `false` keeps the business status in the
    /// body with transport status fixed at 200 (Mode A); `true` promotes the
    /// business status to the transport layer (Mode B).
    #[serde(alias = "enabledHttpStatus")]
    pub enabled_http_status: bool,
    /// Header carrying the URL-encoded message under Mode B. An empty value
    /// disables the header and keeps the full envelope in the body.
    #[serde(alias = "messageHeadTitle")]
    pub message_head_title: String,
    /// Transport status for raw business codes outside the canonical
    /// transport table.
    #[serde(alias = "failHttpStatus")]
    pub fail_http_status: u16,
}

impl Default for EnvelopeProperties {
    fn default() -> Self {
        Self {
            success_code: 200,
            success_message: "success".to_string(),
            not_found_code: 404,
            not_found_message: "not found".to_string(),
            result_field_name: "result".to_string(),
            code_field_name: "code".to_string(),
            message_field_name: "message".to_string(),
            enabled_http_status: false,
            message_head_title: "xx-message".to_string(),
            fail_http_status: 400,
        }
    }
}

/// Wire field names, derived from [`EnvelopeProperties`] once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFields {
    pub code: String,
    pub message: String,
    pub result: String,
}

impl Default for WireFields {
    fn default() -> Self {
        Self {
            code: "code".to_string(),
            message: "message".to_string(),
            result: "result".to_string(),
        }
    }
}

impl From<&EnvelopeProperties> for WireFields {
    fn from(props: &EnvelopeProperties) -> Self {
        Self {
            code: props.code_field_name.clone(),
            message: props.message_field_name.clone(),
            result: props.result_field_name.clone(),
        }
    }
}
