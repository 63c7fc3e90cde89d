//! The canonical response envelope.
//!
//! Every normalized response is an `{code, message, result}` object; the
//! transport status and side-channel headers ride along outside the body.
//! Construction is two-step: pick a status, then attach an optional payload.
//!
//! ```rust
//! use capsule_envelope::Envelope;
//!
//! let envelope = Envelope::ok("x");
//! assert_eq!(envelope.code(), 200);
//! assert_eq!(envelope.message(), "success");
//! assert_eq!(envelope.result(), Some(&"x"));
//! ```

use bytes::Bytes;
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::properties::WireFields;
use crate::status::{ResultStatus, Status, StatusCatalog};

/// Envelope encode/decode failures.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope decode failed: expected a JSON object")]
    NotAnObject,
    /// The configured code field is absent from the decoded object.
    #[error("`{0}` missing, envelope decode failed")]
    MissingCode(String),
    #[error("invalid code value `{0}`")]
    InvalidCode(String),
    #[error("envelope encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The canonical `{code, message, result}` wrapper.
///
/// Created once per request, consumed exactly once by the response
/// normalizer, then discarded. Equality is structural over every field.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    code: i32,
    message: String,
    result: Option<T>,
    http: StatusCode,
    headers: HeaderMap,
}

impl<T> Envelope<T> {
    /// Success envelope with a payload, using the built-in success status.
    pub fn ok(data: T) -> Self {
        EnvelopeBuilder::new(Status::SUCCESS).data(data)
    }

    /// Success envelope without a payload.
    pub fn ok_empty() -> Self {
        EnvelopeBuilder::new(Status::SUCCESS).build()
    }

    /// Not-found envelope, using the built-in not-found status.
    pub fn not_found() -> Self {
        EnvelopeBuilder::new(Status::NOT_FOUND).build()
    }

    /// Failure envelope from a business status, no payload.
    pub fn fail(status: &dyn ResultStatus) -> Self {
        EnvelopeBuilder::new(Status::business(status)).build()
    }

    /// Wrap an optional value: absent goes to not-found, present to success
    /// with the value as payload.
    pub fn of(data: Option<T>) -> Self {
        match data {
            Some(data) => Self::ok(data),
            None => Self::not_found(),
        }
    }

    /// Assemble an envelope from already-resolved parts.
    pub fn from_parts(code: i32, message: impl Into<String>, result: Option<T>, http: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            result,
            http,
            headers: HeaderMap::new(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// The mapped transport status (derived from the code when it was not
    /// given explicitly).
    pub fn http_status(&self) -> StatusCode {
        self.http
    }

    /// Side-channel headers attached to this response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Attach a side-channel header.
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Map the payload, keeping status and headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            code: self.code,
            message: self.message,
            result: self.result.map(f),
            http: self.http,
            headers: self.headers,
        }
    }

    /// Fallibly map the payload, keeping status and headers.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Envelope<U>, E> {
        Ok(Envelope {
            code: self.code,
            message: self.message,
            result: self.result.map(f).transpose()?,
            http: self.http,
            headers: self.headers,
        })
    }
}

impl<T: Serialize> Envelope<T> {
    /// Encode the body with configured field names. The payload is omitted
    /// when absent.
    pub fn to_json(&self, fields: &WireFields) -> Result<Value, EnvelopeError> {
        let mut map = Map::with_capacity(3);
        map.insert(fields.code.clone(), Value::from(self.code));
        map.insert(fields.message.clone(), Value::from(self.message.clone()));
        if let Some(result) = &self.result {
            map.insert(fields.result.clone(), serde_json::to_value(result)?);
        }
        Ok(Value::Object(map))
    }
}

impl Envelope<Value> {
    /// Decode a body produced with the given field names.
    ///
    /// The code field is mandatory; decoding an object without it is a
    /// validation failure. The message defaults to empty and the payload to
    /// absent. The transport status is re-derived from the code.
    pub fn from_json(value: Value, fields: &WireFields) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let code = match map.get(&fields.code) {
            None => return Err(EnvelopeError::MissingCode(fields.code.clone())),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| EnvelopeError::InvalidCode(n.to_string()))?,
            Some(Value::String(s)) => s
                .parse::<i32>()
                .map_err(|_| EnvelopeError::InvalidCode(s.clone()))?,
            Some(other) => return Err(EnvelopeError::InvalidCode(other.to_string())),
        };
        let message = match map.get(&fields.message) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let result = map.remove(&fields.result).filter(|v| !v.is_null());
        let status = Status::raw(code, message.clone(), StatusCode::BAD_REQUEST);
        Ok(Envelope {
            code,
            message,
            result,
            http: status.http_status(),
            headers: HeaderMap::new(),
        })
    }
}

impl Envelope<Bytes> {
    /// A file-download envelope: octet-stream payload with an attachment
    /// content-disposition carrying the URL-encoded filename.
    pub fn file(filename: &str, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
        let disposition = format!(
            "attachment; filename=\"{}\"",
            urlencoding::encode(filename)
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        Envelope {
            code: Status::SUCCESS.code(),
            message: Status::SUCCESS.message().to_owned(),
            result: Some(data),
            http: StatusCode::OK,
            headers,
        }
    }
}

/// Serialization with the default wire field names. Runtime-configured names
/// go through [`Envelope::to_json`] instead.
impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.result.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("code", &self.code)?;
        map.serialize_entry("message", &self.message)?;
        if let Some(result) = &self.result {
            map.serialize_entry("result", result)?;
        }
        map.end()
    }
}

/// Second step of fluent construction: a selected status awaiting its
/// optional payload.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    status: Status,
}

impl EnvelopeBuilder {
    /// Start fluent construction from a status.
    ///
    /// Lives on the builder rather than on `Envelope` so the payload type
    /// stays unconstrained until `data` or `build` supplies it.
    ///
    /// ```rust
    /// use capsule_envelope::{Envelope, EnvelopeBuilder};
    /// use http::StatusCode;
    ///
    /// let envelope: Envelope<&str> =
    ///     EnvelopeBuilder::new(StatusCode::ACCEPTED.into()).data("queued");
    /// assert_eq!(envelope.code(), 202);
    /// ```
    pub fn new(status: Status) -> Self {
        Self { status }
    }

    /// Finish without a payload.
    pub fn build<T>(self) -> Envelope<T> {
        Envelope {
            code: self.status.code(),
            message: self.status.message().to_owned(),
            result: None,
            http: self.status.http_status(),
            headers: HeaderMap::new(),
        }
    }

    /// Finish with a payload.
    pub fn data<T>(self, data: T) -> Envelope<T> {
        let mut envelope = self.build();
        envelope.result = Some(data);
        envelope
    }
}

impl StatusCatalog {
    /// Success envelope with a payload, using configured code/message.
    pub fn ok<T>(&self, data: T) -> Envelope<T> {
        EnvelopeBuilder::new(self.success().clone()).data(data)
    }

    /// Not-found envelope using configured code/message.
    pub fn none<T>(&self) -> Envelope<T> {
        EnvelopeBuilder::new(self.not_found().clone()).build()
    }

    /// Wrap an optional value with configured statuses.
    pub fn of<T>(&self, data: Option<T>) -> Envelope<T> {
        match data {
            Some(data) => self.ok(data),
            None => self.none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_wraps_payload_with_success_status() {
        let envelope = Envelope::ok("x");
        assert_eq!(envelope.code(), 200);
        assert_eq!(envelope.message(), "success");
        assert_eq!(envelope.result(), Some(&"x"));
        assert_eq!(envelope.http_status(), StatusCode::OK);
    }

    #[test]
    fn of_none_is_not_found_without_payload() {
        let envelope: Envelope<String> = Envelope::of(None);
        assert_eq!(envelope.code(), 404);
        assert_eq!(envelope.message(), "not found");
        assert!(envelope.result().is_none());
        assert_eq!(envelope.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn of_some_is_success_with_payload() {
        let envelope = Envelope::of(Some(7));
        assert_eq!(envelope.code(), 200);
        assert_eq!(envelope.result(), Some(&7));
    }

    #[test]
    fn fluent_construction_keeps_status_fields() {
        struct Pwd;
        impl ResultStatus for Pwd {
            fn code(&self) -> i32 {
                801
            }
            fn message(&self) -> &str {
                "password mismatch"
            }
            fn name(&self) -> &str {
                "PASSWORD_MISMATCH"
            }
        }
        let envelope: Envelope<Value> = EnvelopeBuilder::new(Status::business(&Pwd)).build();
        assert_eq!(envelope.code(), 801);
        assert_eq!(envelope.message(), "password mismatch");
        assert_eq!(envelope.http_status(), StatusCode::BAD_REQUEST);
        assert!(envelope.result().is_none());
    }

    #[test]
    fn builder_needs_no_payload_annotation_in_generic_context() {
        // the payload type flows in from `data`, never from the builder
        fn wrap<T>(status: Status, data: T) -> Envelope<T> {
            EnvelopeBuilder::new(status).data(data)
        }
        let envelope = wrap(Status::SUCCESS, 5);
        assert_eq!(envelope.code(), 200);
        assert_eq!(envelope.result(), Some(&5));
    }

    #[test]
    fn default_serialization_omits_absent_payload() {
        let envelope: Envelope<String> = Envelope::not_found();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"code": 404, "message": "not found"}));
    }

    #[test]
    fn round_trip_with_configured_field_names() {
        let fields = WireFields {
            code: "status".to_string(),
            message: "msg".to_string(),
            result: "data".to_string(),
        };
        let envelope = Envelope::ok(json!({"id": 1}));
        let encoded = envelope.to_json(&fields).unwrap();
        assert_eq!(
            encoded,
            json!({"status": 200, "msg": "success", "data": {"id": 1}})
        );

        let decoded = Envelope::from_json(encoded.clone(), &fields).unwrap();
        assert_eq!(decoded.code(), envelope.code());
        assert_eq!(decoded.message(), envelope.message());
        assert_eq!(decoded.result(), envelope.result());
        assert_eq!(decoded.to_json(&fields).unwrap(), encoded);
    }

    #[test]
    fn decode_without_code_field_fails() {
        let fields = WireFields::default();
        let err = Envelope::from_json(json!({"message": "success"}), &fields).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingCode(name) if name == "code"));
    }

    #[test]
    fn decode_accepts_numeric_string_code() {
        let fields = WireFields::default();
        let envelope = Envelope::from_json(json!({"code": "404"}), &fields).unwrap();
        assert_eq!(envelope.code(), 404);
        assert_eq!(envelope.message(), "");
        assert_eq!(envelope.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn structural_equality_compares_all_fields() {
        let a = Envelope::ok("x");
        let b = Envelope::ok("x");
        assert_eq!(a, b);
        let c = a.clone().with_header(
            http::header::HeaderName::from_static("x-extra"),
            HeaderValue::from_static("1"),
        );
        assert_ne!(b, c);
    }

    #[test]
    fn catalog_of_uses_configured_statuses() {
        let props = crate::properties::EnvelopeProperties {
            not_found_code: 1404,
            not_found_message: "nothing".to_string(),
            ..Default::default()
        };
        let catalog = StatusCatalog::from_properties(&props);
        let envelope: Envelope<i32> = catalog.of(None);
        assert_eq!(envelope.code(), 1404);
        assert_eq!(envelope.message(), "nothing");
    }

    #[test]
    fn file_envelope_sets_download_headers() {
        let envelope = Envelope::file("report 1.txt", &b"contents"[..]);
        assert_eq!(
            envelope.headers().get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        let disposition = envelope.headers().get(CONTENT_DISPOSITION).unwrap();
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        // spaces must be URL-encoded in the filename
        assert!(disposition.contains("report%201.txt"));
        assert_eq!(envelope.result().unwrap().as_ref(), b"contents");
    }
}
