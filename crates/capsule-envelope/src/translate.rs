//! Exception-to-response translation.
//!
//! The single catch-and-convert point: maps every [`ServiceError`] raised
//! during request handling into an [`ErrorView`], most specific rule first,
//! and logs the resolved message with the request target.

use http::StatusCode;
use tracing::error;

use crate::error::{FieldError, ServiceError, join_fields};
use crate::view::ErrorView;

/// Maps request-handling errors into client-facing [`ErrorView`]s.
#[derive(Debug, Default, Clone)]
pub struct ErrorTranslator {
    _priv: (),
}

impl ErrorTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate an error, logging the outcome against `target` (the
    /// request line the error belongs to).
    pub fn translate(&self, err: &ServiceError, target: &str) -> ErrorView {
        let view = self.build_view(err);
        error!(request = %target, "request failed: {}", view.message());
        for field_error in view.errors() {
            error!("{field_error}");
        }
        view
    }

    fn build_view(&self, err: &ServiceError) -> ErrorView {
        match err {
            // explicit domain outcome, translated verbatim
            ServiceError::Business(api) => ErrorView::builder()
                .code(api.code())
                .message(api.message())
                .http(api.http_status())
                .build(),
            ServiceError::Validation(errors) => ErrorView::builder()
                .code(i32::from(StatusCode::BAD_REQUEST.as_u16()))
                .message(join_fields(errors))
                .http(StatusCode::BAD_REQUEST)
                .errors(errors.clone())
                .build(),
            ServiceError::BodyParse { field, detail } => match field {
                Some(field) => ErrorView::builder()
                    .code(i32::from(StatusCode::BAD_REQUEST.as_u16()))
                    .message(format!("{field} parameter error"))
                    .http(StatusCode::BAD_REQUEST)
                    .errors(vec![FieldError::new(field.clone(), detail.clone())])
                    .build(),
                None => ErrorView::builder()
                    .code(i32::from(StatusCode::BAD_REQUEST.as_u16()))
                    .message("parameter parse failed")
                    .http(StatusCode::BAD_REQUEST)
                    .build(),
            },
            ServiceError::Conversion(convert) => ErrorView::builder()
                .code(i32::from(StatusCode::BAD_REQUEST.as_u16()))
                .message(convert.to_string())
                .http(StatusCode::BAD_REQUEST)
                .build(),
            // configuration faults are server-side faults by the time a
            // request observes them
            ServiceError::Configuration(_) | ServiceError::Internal(_) => ErrorView::builder()
                .code(i32::from(StatusCode::INTERNAL_SERVER_ERROR.as_u16()))
                .message(err.to_string())
                .http(StatusCode::INTERNAL_SERVER_ERROR)
                .build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConvertError;
    use crate::error::ApiError;

    fn translate(err: &ServiceError) -> ErrorView {
        ErrorTranslator::new().translate(err, "GET /test")
    }

    #[test]
    fn business_error_translates_verbatim() {
        let err = ServiceError::Business(ApiError::new(801, "password mismatch"));
        let view = translate(&err);
        assert_eq!(view.code(), 801);
        assert_eq!(view.message(), "password mismatch");
        assert_eq!(view.http_status(), StatusCode::BAD_REQUEST);
        assert!(view.errors().is_empty());
    }

    #[test]
    fn validation_aggregates_fields_in_order() {
        let err = ServiceError::Validation(vec![
            FieldError::new("a", "must not be empty"),
            FieldError::new("b", "must be positive"),
        ]);
        let view = translate(&err);
        assert_eq!(view.code(), 400);
        assert_eq!(view.message(), "a,b parameter error");
        assert_eq!(view.errors().len(), 2);
        assert_eq!(view.errors()[0].field, "a");
        assert_eq!(view.errors()[1].field, "b");
    }

    #[test]
    fn body_parse_with_field_surfaces_that_field() {
        let err = ServiceError::BodyParse {
            field: Some("gender".to_string()),
            detail: "invalid value".to_string(),
        };
        let view = translate(&err);
        assert_eq!(view.message(), "gender parameter error");
        assert_eq!(view.errors().len(), 1);
        assert_eq!(view.errors()[0].field, "gender");
    }

    #[test]
    fn body_parse_without_field_is_generic() {
        let err = ServiceError::BodyParse {
            field: None,
            detail: "unexpected end of input".to_string(),
        };
        let view = translate(&err);
        assert_eq!(view.message(), "parameter parse failed");
        assert!(view.errors().is_empty());
        assert_eq!(view.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conversion_error_is_client_class() {
        let err = ServiceError::Conversion(ConvertError::OutOfRange {
            type_name: "Gender",
            ordinal: 2,
            len: 2,
        });
        let view = translate(&err);
        assert_eq!(view.http_status(), StatusCode::BAD_REQUEST);
        assert!(view.message().contains("out of range"));
    }

    #[test]
    fn unclassified_error_is_server_class() {
        let err = ServiceError::Internal("boom".to_string());
        let view = translate(&err);
        assert_eq!(view.code(), 500);
        assert_eq!(view.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
