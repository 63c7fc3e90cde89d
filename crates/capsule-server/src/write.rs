//! Final body serialization stage.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderValue;

use capsule_envelope::ServiceError;

use crate::pipeline::{BodyPayload, MediaType, ResponseContext, ResponseStage};

const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");
const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain");

/// Serializes the placed payload into the outgoing body and sets the
/// content headers. Runs after the normalizer; a raw response short-circuits
/// it, and a context with no placed body is passed through untouched.
#[derive(Debug, Clone, Default)]
pub struct JsonBodyWriter;

impl JsonBodyWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseStage for JsonBodyWriter {
    fn name(&self) -> &'static str {
        "json-writer"
    }

    fn apply(&self, cx: &mut ResponseContext) -> Result<(), ServiceError> {
        if cx.is_raw() {
            return Ok(());
        }
        let Some(body) = cx.take_body() else {
            return Ok(());
        };
        match body {
            // string payloads under non-JSON negotiation leave as plain text
            BodyPayload::Json(serde_json::Value::String(text))
                if cx.media() == MediaType::Other =>
            {
                cx.headers.insert(CONTENT_TYPE, TEXT_PLAIN);
                set_length(cx, text.len());
                cx.write(Bytes::from(text));
            }
            BodyPayload::Json(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|err| ServiceError::Internal(err.to_string()))?;
                cx.headers.insert(CONTENT_TYPE, APPLICATION_JSON);
                set_length(cx, bytes.len());
                cx.write(Bytes::from(bytes));
            }
            BodyPayload::Bytes(bytes) => {
                // file downloads carry their own content type when set upstream
                if !cx.headers.contains_key(CONTENT_TYPE) {
                    cx.headers.insert(CONTENT_TYPE, OCTET_STREAM);
                }
                set_length(cx, bytes.len());
                cx.write(bytes);
            }
            BodyPayload::Empty => {
                set_length(cx, 0);
                cx.write(Bytes::new());
            }
        }
        Ok(())
    }
}

fn set_length(cx: &mut ResponseContext, len: usize) {
    cx.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
}
