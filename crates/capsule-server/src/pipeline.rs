//! Outbound response pipeline.
//!
//! An explicit ordered list of stages, assembled in
//! [`crate::server::ApiServerBuilder::build`]. The normalizer must run
//! strictly before the body writer. Each stage sees the context exactly
//! once; a writer running first would serialize the unwrapped handler
//! value and the normalizer's output would never reach the wire. The
//! ordering is plain data and covered by a regression test.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;

use capsule_envelope::{ErrorView, ServiceError};

use crate::handler::HandlerValue;

/// Negotiated response media class. The envelope only has a structured
/// rendering for JSON; everything else falls back to payload-only writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Json,
    Other,
}

impl MediaType {
    /// Negotiate from the request `Accept` header. Absent, wildcard and
    /// JSON accepts all negotiate to JSON.
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let Some(accept) = headers.get(http::header::ACCEPT) else {
            return MediaType::Json;
        };
        let Ok(accept) = accept.to_str() else {
            return MediaType::Other;
        };
        let json = accept.split(',').any(|part| {
            let mime = part.split(';').next().unwrap_or("").trim();
            mime == "*/*" || mime == "application/*" || mime == "application/json"
        });
        if json { MediaType::Json } else { MediaType::Other }
    }
}

/// The converged handler outcome entering the pipeline: normal return
/// values and translated errors meet here.
#[derive(Debug)]
pub enum Outcome {
    Value(HandlerValue),
    Error(ErrorView),
}

/// Body content between the normalizer and the writer.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    Json(serde_json::Value),
    Bytes(Bytes),
    Empty,
}

/// Per-request mutable state threaded through the stages.
#[derive(Debug)]
pub struct ResponseContext {
    media: MediaType,
    outcome: Option<Outcome>,
    body: Option<BodyPayload>,
    raw: Option<Response<Full<Bytes>>>,
    written: Option<Bytes>,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseContext {
    pub fn new(media: MediaType, outcome: Outcome) -> Self {
        Self {
            media,
            outcome: Some(outcome),
            body: None,
            raw: None,
            written: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    pub fn media(&self) -> MediaType {
        self.media
    }

    /// Take the handler outcome; each request's outcome is consumed exactly
    /// once.
    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }

    pub fn set_body(&mut self, body: BodyPayload) {
        self.body = Some(body);
    }

    pub fn take_body(&mut self) -> Option<BodyPayload> {
        self.body.take()
    }

    /// Short-circuit with a raw transport response.
    pub fn set_raw(&mut self, response: Response<Full<Bytes>>) {
        self.raw = Some(response);
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub fn write(&mut self, bytes: Bytes) {
        self.written = Some(bytes);
    }

    /// Assemble the final transport response.
    pub fn finish(self) -> Response<Full<Bytes>> {
        if let Some(raw) = self.raw {
            return raw;
        }
        let mut response = Response::new(Full::new(self.written.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// One stage of the outbound pipeline.
pub trait ResponseStage: Send + Sync {
    /// Stable stage name, used for composition checks and logging.
    fn name(&self) -> &'static str;

    fn apply(&self, cx: &mut ResponseContext) -> Result<(), ServiceError>;
}

/// Ordered stage list. Stages execute in registration order; the first
/// error aborts the request.
#[derive(Clone)]
pub struct ResponsePipeline {
    stages: Vec<Arc<dyn ResponseStage>>,
}

impl ResponsePipeline {
    pub fn new(stages: Vec<Arc<dyn ResponseStage>>) -> Self {
        Self { stages }
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, cx: &mut ResponseContext) -> Result<(), ServiceError> {
        for stage in &self.stages {
            stage.apply(cx)?;
        }
        Ok(())
    }
}
