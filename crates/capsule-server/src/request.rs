//! Incoming request view handed to handlers.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;

use capsule_envelope::ServiceError;

/// A fully-read request: method, path, decoded query, route captures,
/// headers and body bytes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: HashMap<String, String>,
        params: HashMap<String, String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            params,
            headers,
            body,
        }
    }

    /// Build from hyper request parts plus the captures from routing.
    pub fn from_parts(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        let query = parts
            .uri
            .query()
            .map(parse_query)
            .unwrap_or_default();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query,
            params,
            headers: parts.headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request line identifier used in error logging.
    pub fn target(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Decoded query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Route capture (`{name}` segments).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the JSON body.
    ///
    /// Parse failures surface as [`ServiceError::BodyParse`]; `serde_json`
    /// reports position rather than field path, so the field stays unknown
    /// here and handlers attach field names through their own validation.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        serde_json::from_slice(&self.body).map_err(|e| ServiceError::BodyParse {
            field: None,
            detail: e.to_string(),
        })
    }
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = urlencoding::decode(name).unwrap_or_default().into_owned();
        let value = urlencoding::decode(value).unwrap_or_default().into_owned();
        query.insert(name, value);
    }
    query
}
