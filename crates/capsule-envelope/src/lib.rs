//! # capsule-envelope
//!
//! Transport-agnostic response-envelope infrastructure for JSON web
//! services: a business status model, the canonical `{code, message,
//! result}` envelope, an error taxonomy with a single translation point,
//! and a registry-based converter turning wire tokens into typed enums.
//!
//! ## Features
//! - Two-step fluent envelope construction (`EnvelopeBuilder::new(status)`
//!   then `.data(...)` or `.build()`)
//! - `of` semantics: absent value maps to not-found, present to success
//! - Configurable wire field names, symmetric on encode and decode
//! - Startup-built status catalog, no global mutable state
//! - Fail-fast enum converter registry with populate-once caching

pub mod convert;
pub mod envelope;
pub mod error;
pub mod properties;
pub mod status;
pub mod translate;
pub mod view;

// Re-export main types
pub use convert::{ConfigError, ConvertError, EnumRegistry, WireEnum};
pub use envelope::{Envelope, EnvelopeBuilder, EnvelopeError};
pub use error::{ApiError, FieldError, ServiceError};
pub use properties::{EnvelopeProperties, WireFields};
pub use status::{ResultStatus, Status, StatusCatalog, StatusSource};
pub use translate::ErrorTranslator;
pub use view::ErrorView;
