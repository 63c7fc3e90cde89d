//! Error presentation model.

use http::StatusCode;

use crate::error::FieldError;

/// What a failed request looks like to the client: the same shape class as
/// the envelope, plus an ordered list of field-level violations.
///
/// Created once per failed request, consumed immediately by the response
/// normalizer, never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    code: i32,
    message: String,
    http: StatusCode,
    errors: Vec<FieldError>,
}

impl ErrorView {
    pub fn builder() -> ErrorViewBuilder {
        ErrorViewBuilder::default()
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> StatusCode {
        self.http
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

#[derive(Debug, Default)]
pub struct ErrorViewBuilder {
    code: i32,
    message: String,
    http: Option<StatusCode>,
    errors: Vec<FieldError>,
}

impl ErrorViewBuilder {
    pub fn code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn http(mut self, http: StatusCode) -> Self {
        self.http = Some(http);
        self
    }

    pub fn errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn build(self) -> ErrorView {
        ErrorView {
            code: self.code,
            message: self.message,
            http: self.http.unwrap_or(StatusCode::BAD_REQUEST),
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_client_error_class() {
        let view = ErrorView::builder().code(801).message("password mismatch").build();
        assert_eq!(view.code(), 801);
        assert_eq!(view.message(), "password mismatch");
        assert_eq!(view.http_status(), StatusCode::BAD_REQUEST);
        assert!(view.errors().is_empty());
    }

    #[test]
    fn field_errors_keep_their_order() {
        let view = ErrorView::builder()
            .code(400)
            .errors(vec![
                FieldError::new("a", "first"),
                FieldError::new("b", "second"),
            ])
            .build();
        assert_eq!(view.errors()[0].field, "a");
        assert_eq!(view.errors()[1].field, "b");
    }
}
