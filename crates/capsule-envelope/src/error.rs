//! Error taxonomy.
//!
//! Only the [`crate::translate::ErrorTranslator`] catches and converts;
//! every other component propagates a [`ServiceError`] upward with `?`.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::convert::{ConfigError, ConvertError};
use crate::envelope::EnvelopeError;
use crate::status::{ResultStatus, Status};

/// A business exception: the handler decided the outcome itself and carries
/// explicit code/message/transport status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}")]
pub struct ApiError {
    status: Status,
}

impl ApiError {
    /// Business error from a raw code and message. Codes outside the
    /// canonical transport table map to `400 Bad Request`.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            status: Status::raw(code, message.into(), StatusCode::BAD_REQUEST),
        }
    }

    /// Business error from an application status constant.
    pub fn from_status(status: &dyn ResultStatus) -> Self {
        Self {
            status: Status::business(status),
        }
    }

    /// Business error from a transport status.
    pub fn from_transport(status: StatusCode) -> Self {
        Self {
            status: Status::transport(status),
        }
    }

    /// Business error from an already-resolved status.
    pub fn from_resolved(status: Status) -> Self {
        Self { status }
    }

    /// Replace the message, keeping code and transport mapping.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status = Status::new(
            self.status.code(),
            message.into(),
            self.status.name().to_owned(),
            self.status.http_status(),
        );
        self
    }

    pub fn code(&self) -> i32 {
        self.status.code()
    }

    pub fn message(&self) -> &str {
        self.status.message()
    }

    pub fn http_status(&self) -> StatusCode {
        self.status.http_status()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}

/// One field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Unified request-handling error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Explicit domain outcome, translated verbatim.
    #[error(transparent)]
    Business(#[from] ApiError),

    /// Input-binding failures, aggregated per field.
    #[error("{}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// The request body could not be parsed into the expected shape.
    #[error("parameter parse failed: {detail}")]
    BodyParse {
        /// Deepest field the parser could attribute the failure to.
        field: Option<String>,
        detail: String,
    },

    /// Unmatched wire token or out-of-range ordinal.
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// Registry misconfiguration surfacing at first use.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Anything unclassified.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Single-field validation failure.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

pub(crate) fn join_fields(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return "parameter error".to_string();
    }
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    format!("{} parameter error", fields.join(","))
}

impl From<EnvelopeError> for ServiceError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Encode(e) => ServiceError::Internal(e.to_string()),
            decode => ServiceError::BodyParse {
                field: None,
                detail: decode.to_string(),
            },
        }
    }
}
