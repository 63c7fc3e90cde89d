//! Response normalization.
//!
//! Every handler outcome, whether a normal return value or a translated
//! error, converges here and leaves as one canonical envelope. The
//! placement policy decides where the business status lives:
//!
//! - **Mode A** (`enabled_http_status = false`): transport status fixed at
//!   200, the body carries the full `{code, message, result}` envelope.
//! - **Mode B** (`true`): transport status is the envelope's mapped status.
//!   With a message header configured the message moves, URL-encoded, into
//!   that header and the body reduces to payload only; without one the full
//!   envelope stays in the body.
//! - Mode B with a non-JSON negotiated media type always reduces to payload
//!   only; the transport status keeps the mapped business status.

use http::header::HeaderName;
use http::{HeaderValue, StatusCode};
use serde_json::Value;

use capsule_envelope::{Envelope, EnvelopeProperties, ErrorView, ServiceError, StatusCatalog, WireFields};

use crate::handler::HandlerValue;
use crate::pipeline::{BodyPayload, MediaType, Outcome, ResponseContext, ResponseStage};

/// Wraps handler outcomes into envelopes and applies the placement policy.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    catalog: StatusCatalog,
    fields: WireFields,
    promote: bool,
    message_header: Option<HeaderName>,
}

impl ResponseNormalizer {
    /// Resolve the normalizer from configuration. An invalid message header
    /// name is a configuration fault.
    pub fn from_properties(props: &EnvelopeProperties) -> Result<Self, ServiceError> {
        let message_header = match props.message_head_title.trim() {
            "" => None,
            name => Some(name.parse::<HeaderName>().map_err(|_| {
                ServiceError::Internal(format!("invalid message header name `{name}`"))
            })?),
        };
        Ok(Self {
            catalog: StatusCatalog::from_properties(props),
            fields: WireFields::from(props),
            promote: props.enabled_http_status,
            message_header,
        })
    }

    fn wrap(&self, value: HandlerValue) -> Wrapped {
        match value {
            HandlerValue::Raw(response) => Wrapped::Raw(response),
            HandlerValue::Envelope(envelope) => Wrapped::Json(envelope),
            HandlerValue::File(envelope) => Wrapped::File(envelope),
            HandlerValue::Value(value) if value.is_null() => Wrapped::Json(self.catalog.of(None)),
            HandlerValue::Value(value) => Wrapped::Json(self.catalog.ok(value)),
            HandlerValue::Empty => Wrapped::Json(self.catalog.of(None)),
        }
    }

    /// An error view becomes an envelope of the same shape class; field
    /// errors, when present, ride in the payload.
    fn wrap_error(&self, view: ErrorView) -> Envelope<Value> {
        let payload = if view.errors().is_empty() {
            None
        } else {
            serde_json::to_value(view.errors()).ok()
        };
        Envelope::from_parts(view.code(), view.message(), payload, view.http_status())
    }

    fn place_json(&self, cx: &mut ResponseContext, envelope: Envelope<Value>) -> Result<(), ServiceError> {
        let headers = envelope.headers().clone();
        cx.headers.extend(headers);

        if !self.promote {
            cx.status = StatusCode::OK;
            cx.set_body(BodyPayload::Json(envelope.to_json(&self.fields)?));
            return Ok(());
        }

        cx.status = envelope.http_status();
        if cx.media() != MediaType::Json {
            // non-structured negotiation: payload only, status stays mapped
            set_payload_only(cx, envelope);
        } else if let Some(header) = &self.message_header {
            let encoded = urlencoding::encode(envelope.message()).into_owned();
            let value = HeaderValue::from_str(&encoded).map_err(|_| {
                ServiceError::Internal("message not encodable as a header value".to_string())
            })?;
            cx.headers.insert(header.clone(), value);
            set_payload_only(cx, envelope);
        } else {
            cx.set_body(BodyPayload::Json(envelope.to_json(&self.fields)?));
        }
        Ok(())
    }

    fn place_file(&self, cx: &mut ResponseContext, envelope: Envelope<bytes::Bytes>) {
        let headers = envelope.headers().clone();
        cx.headers.extend(headers);
        cx.status = if self.promote {
            envelope.http_status()
        } else {
            StatusCode::OK
        };
        // octet-stream is never structured: payload only
        match envelope.into_result() {
            Some(bytes) => cx.set_body(BodyPayload::Bytes(bytes)),
            None => cx.set_body(BodyPayload::Empty),
        }
    }
}

enum Wrapped {
    Raw(http::Response<http_body_util::Full<bytes::Bytes>>),
    Json(Envelope<Value>),
    File(Envelope<bytes::Bytes>),
}

fn set_payload_only(cx: &mut ResponseContext, envelope: Envelope<Value>) {
    match envelope.into_result() {
        Some(value) => cx.set_body(BodyPayload::Json(value)),
        None => cx.set_body(BodyPayload::Empty),
    }
}

impl ResponseStage for ResponseNormalizer {
    fn name(&self) -> &'static str {
        "normalizer"
    }

    fn apply(&self, cx: &mut ResponseContext) -> Result<(), ServiceError> {
        // runs exactly once per request: the outcome is consumed here
        let Some(outcome) = cx.take_outcome() else {
            return Ok(());
        };
        let wrapped = match outcome {
            Outcome::Value(value) => self.wrap(value),
            Outcome::Error(view) => Wrapped::Json(self.wrap_error(view)),
        };
        match wrapped {
            Wrapped::Raw(response) => {
                cx.set_raw(response);
                Ok(())
            }
            Wrapped::Json(envelope) => self.place_json(cx, envelope),
            Wrapped::File(envelope) => {
                self.place_file(cx, envelope);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_envelope::{ApiError, ErrorTranslator, FieldError};
    use serde_json::json;

    fn normalizer(props: &EnvelopeProperties) -> ResponseNormalizer {
        ResponseNormalizer::from_properties(props).unwrap()
    }

    fn run(
        normalizer: &ResponseNormalizer,
        media: MediaType,
        outcome: Outcome,
    ) -> ResponseContext {
        let mut cx = ResponseContext::new(media, outcome);
        normalizer.apply(&mut cx).unwrap();
        cx
    }

    fn business_error_view(code: i32, message: &str) -> ErrorView {
        ErrorTranslator::new().translate(
            &ServiceError::Business(ApiError::new(code, message)),
            "GET /test",
        )
    }

    #[test]
    fn mode_a_keeps_full_envelope_at_http_200() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let view = business_error_view(801, "password mismatch");
        let mut cx = run(&normalizer, MediaType::Json, Outcome::Error(view));

        assert_eq!(cx.status, StatusCode::OK);
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(
                json!({"code": 801, "message": "password mismatch"})
            ))
        );
    }

    #[test]
    fn mode_b_with_header_promotes_status_and_reduces_body() {
        let props = EnvelopeProperties {
            enabled_http_status: true,
            ..Default::default()
        };
        let normalizer = normalizer(&props);
        let view = business_error_view(801, "password mismatch");
        let mut cx = run(&normalizer, MediaType::Json, Outcome::Error(view));

        // 801 is outside the transport table, so it maps to the client-error class
        assert_eq!(cx.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            cx.headers.get("xx-message").unwrap(),
            "password%20mismatch"
        );
        // payload absent: body reduces to nothing
        assert_eq!(cx.take_body(), Some(BodyPayload::Empty));
    }

    #[test]
    fn mode_b_without_header_keeps_full_envelope_body() {
        let props = EnvelopeProperties {
            enabled_http_status: true,
            message_head_title: String::new(),
            ..Default::default()
        };
        let normalizer = normalizer(&props);
        let mut cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Value(json!("x"))),
        );

        assert_eq!(cx.status, StatusCode::OK);
        assert!(cx.headers.get("xx-message").is_none());
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(
                json!({"code": 200, "message": "success", "result": "x"})
            ))
        );
    }

    #[test]
    fn mode_b_non_json_media_falls_back_to_payload_only() {
        let props = EnvelopeProperties {
            enabled_http_status: true,
            message_head_title: String::new(),
            ..Default::default()
        };
        let normalizer = normalizer(&props);
        let mut cx = run(
            &normalizer,
            MediaType::Other,
            Outcome::Value(HandlerValue::Value(json!("plain"))),
        );

        // body reduced, transport status still the mapped one
        assert_eq!(cx.status, StatusCode::OK);
        assert_eq!(cx.take_body(), Some(BodyPayload::Json(json!("plain"))));
    }

    #[test]
    fn plain_value_wraps_with_of_semantics() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let mut cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Value(json!({"id": 1}))),
        );
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(
                json!({"code": 200, "message": "success", "result": {"id": 1}})
            ))
        );
    }

    #[test]
    fn null_value_wraps_as_not_found() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let mut cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Value(Value::Null)),
        );
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(json!({"code": 404, "message": "not found"})))
        );
    }

    #[test]
    fn prebuilt_envelope_passes_through_unchanged() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let envelope = capsule_envelope::EnvelopeBuilder::new(capsule_envelope::Status::SUCCESS)
            .data(json!(41))
            .with_header("x-trace".parse().unwrap(), "abc".parse().unwrap());
        let mut cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Envelope(envelope)),
        );
        assert_eq!(cx.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(
                json!({"code": 200, "message": "success", "result": 41})
            ))
        );
    }

    #[test]
    fn raw_response_bypasses_normalization() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let response = http::Response::builder()
            .status(StatusCode::IM_A_TEAPOT)
            .body(http_body_util::Full::new(bytes::Bytes::from_static(b"raw")))
            .unwrap();
        let cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Raw(response)),
        );
        assert!(cx.is_raw());
        let response = cx.finish();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn field_errors_ride_in_the_payload() {
        let normalizer = normalizer(&EnvelopeProperties::default());
        let view = ErrorTranslator::new().translate(
            &ServiceError::Validation(vec![
                FieldError::new("a", "must not be empty"),
                FieldError::new("b", "must be positive"),
            ]),
            "POST /user",
        );
        let mut cx = run(&normalizer, MediaType::Json, Outcome::Error(view));
        let Some(BodyPayload::Json(body)) = cx.take_body() else {
            panic!("expected a JSON body");
        };
        assert_eq!(body["message"], "a,b parameter error");
        assert_eq!(body["result"][0]["field"], "a");
        assert_eq!(body["result"][1]["field"], "b");
    }

    #[test]
    fn custom_wire_fields_apply_on_the_way_out() {
        let props = EnvelopeProperties {
            code_field_name: "status".to_string(),
            result_field_name: "data".to_string(),
            ..Default::default()
        };
        let normalizer = normalizer(&props);
        let mut cx = run(
            &normalizer,
            MediaType::Json,
            Outcome::Value(HandlerValue::Value(json!(1))),
        );
        assert_eq!(
            cx.take_body(),
            Some(BodyPayload::Json(
                json!({"status": 200, "message": "success", "data": 1})
            ))
        );
    }
}
