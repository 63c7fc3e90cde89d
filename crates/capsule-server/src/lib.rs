//! HTTP layer for the capsule envelope convention.
//!
//! Handlers return plain values, prebuilt envelopes, file downloads or raw
//! responses; the response pipeline normalizes each into the configured
//! envelope shape and placement mode. Errors raised anywhere in a handler
//! are translated into the same shape, so clients see a single wire
//! contract regardless of outcome.

pub mod handler;
pub mod normalize;
pub mod pipeline;
pub mod request;
pub mod router;
pub mod server;
pub mod write;

pub use handler::{ApiHandler, HandlerValue};
pub use normalize::ResponseNormalizer;
pub use pipeline::{BodyPayload, MediaType, Outcome, ResponseContext, ResponsePipeline, ResponseStage};
pub use request::ApiRequest;
pub use router::Router;
pub use server::{ApiServer, ApiServerBuilder, ServerConfig};
pub use write::JsonBodyWriter;

pub use capsule_envelope as envelope;
