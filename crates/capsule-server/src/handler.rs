//! Handler seam: what a route invocation produces.

use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

use capsule_envelope::{Envelope, ServiceError};

use crate::request::ApiRequest;

/// What a handler returns: either a plain value for the normalizer to wrap,
/// an envelope it built itself, or a raw transport response that bypasses
/// normalization entirely.
#[derive(Debug)]
pub enum HandlerValue {
    /// Already the transport entity; the pipeline passes it through
    /// untouched.
    Raw(Response<Full<Bytes>>),
    /// A pre-built envelope, emitted unchanged.
    Envelope(Envelope<Value>),
    /// A file-download envelope with a byte payload.
    File(Envelope<Bytes>),
    /// A plain value, wrapped with `of` semantics (JSON null maps to
    /// not-found).
    Value(Value),
    /// No content; wrapped as not-found.
    Empty,
}

impl HandlerValue {
    /// Serialize any value into the plain-value variant.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ServiceError> {
        serde_json::to_value(value)
            .map(HandlerValue::Value)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    /// Serialize an envelope payload into the envelope variant.
    pub fn envelope<T: Serialize>(envelope: Envelope<T>) -> Result<Self, ServiceError> {
        envelope
            .try_map(serde_json::to_value)
            .map(HandlerValue::Envelope)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

impl From<Envelope<Value>> for HandlerValue {
    fn from(envelope: Envelope<Value>) -> Self {
        HandlerValue::Envelope(envelope)
    }
}

impl From<Envelope<Bytes>> for HandlerValue {
    fn from(envelope: Envelope<Bytes>) -> Self {
        HandlerValue::File(envelope)
    }
}

impl From<Value> for HandlerValue {
    fn from(value: Value) -> Self {
        HandlerValue::Value(value)
    }
}

/// A route endpoint.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle(&self, req: ApiRequest) -> Result<HandlerValue, ServiceError>;
}
