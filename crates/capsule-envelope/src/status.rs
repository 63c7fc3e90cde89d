//! Business status model.
//!
//! A [`Status`] is the resolved, immutable outcome descriptor every envelope
//! carries: business code, human message, symbolic name and the transport
//! status it maps to. Statuses come from three sources, normalized at
//! construction time via [`StatusSource`]:
//!
//! - business-defined enums implementing [`ResultStatus`]
//! - transport statuses ([`http::StatusCode`])
//! - raw integer codes, resolved against the canonical transport status
//!   table and falling back to a configured failure status otherwise

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;

use crate::properties::EnvelopeProperties;

/// Business-defined outcome status.
///
/// Application status enums implement this trait; each constant carries a
/// fixed code, message and transport status mapping.
///
/// ```rust
/// use capsule_envelope::{ResultStatus, Status};
/// use http::StatusCode;
///
/// enum DemoStatus {
///     PasswordMismatch,
/// }
///
/// impl ResultStatus for DemoStatus {
///     fn code(&self) -> i32 { 801 }
///     fn message(&self) -> &str { "password mismatch" }
///     fn name(&self) -> &str { "PASSWORD_MISMATCH" }
///     fn http_status(&self) -> StatusCode { StatusCode::BAD_REQUEST }
/// }
///
/// let status = Status::business(&DemoStatus::PasswordMismatch);
/// assert_eq!(status.code(), 801);
/// ```
pub trait ResultStatus: Send + Sync {
    /// Business status code.
    fn code(&self) -> i32;

    /// Human-readable status text.
    fn message(&self) -> &str;

    /// Symbolic constant name.
    fn name(&self) -> &str;

    /// Transport status this outcome maps to.
    ///
    /// Defaults to `400 Bad Request`, the conventional class for business
    /// failures that do not specify anything more precise.
    fn http_status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// Where a status came from, before normalization.
#[derive(Debug, Clone, Copy)]
pub enum StatusSource<'a> {
    /// An application-defined status constant.
    Business(&'a dyn ResultStatus),
    /// A protocol-level status.
    Transport(StatusCode),
    /// A bare integer code with its message.
    Raw(i32, &'a str),
}

impl fmt::Debug for dyn ResultStatus + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStatus")
            .field("code", &self.code())
            .field("name", &self.name())
            .finish()
    }
}

/// Resolved, immutable outcome descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: i32,
    message: Cow<'static, str>,
    name: Cow<'static, str>,
    http: StatusCode,
}

impl Status {
    /// Built-in success status, used when no catalog is in play.
    pub const SUCCESS: Status = Status {
        code: 200,
        message: Cow::Borrowed("success"),
        name: Cow::Borrowed("OK"),
        http: StatusCode::OK,
    };

    /// Built-in not-found status, used when no catalog is in play.
    pub const NOT_FOUND: Status = Status {
        code: 404,
        message: Cow::Borrowed("not found"),
        name: Cow::Borrowed("NOT_FOUND"),
        http: StatusCode::NOT_FOUND,
    };

    /// Build a status from explicit parts.
    pub fn new(
        code: i32,
        message: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        http: StatusCode,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            name: name.into(),
            http,
        }
    }

    /// Normalize a business status constant.
    pub fn business(status: &dyn ResultStatus) -> Self {
        Self {
            code: status.code(),
            message: Cow::Owned(status.message().to_owned()),
            name: Cow::Owned(status.name().to_owned()),
            http: status.http_status(),
        }
    }

    /// Normalize a transport status: the business code is the status code
    /// itself and the message is the canonical reason phrase.
    pub fn transport(status: StatusCode) -> Self {
        Self {
            code: i32::from(status.as_u16()),
            message: Cow::Borrowed(status.canonical_reason().unwrap_or("")),
            name: Cow::Owned(status.as_u16().to_string()),
            http: status,
        }
    }

    /// Normalize a raw integer code.
    ///
    /// The transport status is looked up against the canonical status table;
    /// codes with no canonical meaning (e.g. `801`) resolve to `fallback`.
    pub fn raw(code: i32, message: impl Into<Cow<'static, str>>, fallback: StatusCode) -> Self {
        let http = lookup_transport(code).unwrap_or(fallback);
        Self {
            code,
            message: message.into(),
            name: Cow::Owned(code.to_string()),
            http,
        }
    }

    /// Normalize any [`StatusSource`]. Raw codes fall back to `fallback`.
    pub fn resolve(source: StatusSource<'_>, fallback: StatusCode) -> Self {
        match source {
            StatusSource::Business(status) => Self::business(status),
            StatusSource::Transport(status) => Self::transport(status),
            StatusSource::Raw(code, message) => {
                Self::raw(code, Cow::Owned(message.to_owned()), fallback)
            }
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_status(&self) -> StatusCode {
        self.http
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<StatusCode> for Status {
    fn from(status: StatusCode) -> Self {
        Status::transport(status)
    }
}

impl<S: ResultStatus> From<&S> for Status {
    fn from(status: &S) -> Self {
        Status::business(status)
    }
}

/// Look a raw code up in the canonical transport status table.
///
/// `StatusCode::from_u16` accepts any three-digit value, so the canonical
/// reason phrase is used to reject codes that merely look like transport
/// statuses (801 parses but is not in the table).
fn lookup_transport(code: i32) -> Option<StatusCode> {
    let code = u16::try_from(code).ok()?;
    let status = StatusCode::from_u16(code).ok()?;
    status.canonical_reason().map(|_| status)
}

/// Process-wide status catalog, built once from configuration at startup.
///
/// Replaces lazily-initialized global success/not-found singletons: the
/// catalog is constructed from an explicit [`EnvelopeProperties`] in the
/// composition root and is immutable afterwards, so configuration changes
/// after startup are structurally unobservable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCatalog {
    success: Status,
    not_found: Status,
    fail_http: StatusCode,
}

impl Default for StatusCatalog {
    fn default() -> Self {
        Self {
            success: Status::SUCCESS,
            not_found: Status::NOT_FOUND,
            fail_http: StatusCode::BAD_REQUEST,
        }
    }
}

impl StatusCatalog {
    /// Resolve the catalog from configuration.
    pub fn from_properties(props: &EnvelopeProperties) -> Self {
        let fail_http =
            StatusCode::from_u16(props.fail_http_status).unwrap_or(StatusCode::BAD_REQUEST);
        Self {
            success: Status::new(
                props.success_code,
                props.success_message.clone(),
                "OK",
                StatusCode::OK,
            ),
            not_found: Status::new(
                props.not_found_code,
                props.not_found_message.clone(),
                "NOT_FOUND",
                StatusCode::NOT_FOUND,
            ),
            fail_http,
        }
    }

    /// The configured success status.
    pub fn success(&self) -> &Status {
        &self.success
    }

    /// The configured not-found status.
    pub fn not_found(&self) -> &Status {
        &self.not_found
    }

    /// Default transport status for raw business codes outside the
    /// canonical table.
    pub fn fail_http(&self) -> StatusCode {
        self.fail_http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum TestStatus {
        Failure,
    }

    impl ResultStatus for TestStatus {
        fn code(&self) -> i32 {
            901
        }
        fn message(&self) -> &str {
            "test failure"
        }
        fn name(&self) -> &str {
            "TEST_FAILURE"
        }
    }

    #[test]
    fn business_status_is_normalized() {
        let status = Status::business(&TestStatus::Failure);
        assert_eq!(status.code(), 901);
        assert_eq!(status.message(), "test failure");
        assert_eq!(status.name(), "TEST_FAILURE");
        // default mapping for business failures
        assert_eq!(status.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transport_status_carries_reason_phrase() {
        let status = Status::transport(StatusCode::NOT_FOUND);
        assert_eq!(status.code(), 404);
        assert_eq!(status.message(), "Not Found");
        assert_eq!(status.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn raw_code_in_transport_table_maps_directly() {
        let status = Status::raw(404, "gone", StatusCode::BAD_REQUEST);
        assert_eq!(status.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(status.message(), "gone");
    }

    #[test]
    fn raw_code_outside_table_uses_fallback() {
        // 801 parses as a StatusCode but has no canonical meaning
        let status = Status::raw(801, "password mismatch", StatusCode::BAD_REQUEST);
        assert_eq!(status.code(), 801);
        assert_eq!(status.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn default_catalog_uses_builtin_statuses() {
        let catalog = StatusCatalog::default();
        assert_eq!(catalog.success(), &Status::SUCCESS);
        assert_eq!(catalog.not_found(), &Status::NOT_FOUND);
    }

    #[test]
    fn catalog_from_properties_overrides_codes() {
        let props = EnvelopeProperties {
            success_code: 0,
            success_message: "ok".to_string(),
            not_found_code: 40400,
            not_found_message: "nothing here".to_string(),
            ..EnvelopeProperties::default()
        };
        let catalog = StatusCatalog::from_properties(&props);
        assert_eq!(catalog.success().code(), 0);
        assert_eq!(catalog.success().message(), "ok");
        assert_eq!(catalog.not_found().code(), 40400);
        // configured not-found still maps to transport 404
        assert_eq!(catalog.not_found().http_status(), StatusCode::NOT_FOUND);
    }
}
