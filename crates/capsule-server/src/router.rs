//! Path routing.
//!
//! Exact segment matching with `{name}` captures; first registered match
//! wins.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::handler::ApiHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: Method,
    segments: Vec<Segment>,
    handler: Arc<dyn ApiHandler>,
}

/// Route table mapping `(method, path pattern)` to handlers.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method and path pattern, e.g.
    /// `/user/{id}`.
    pub fn route(&mut self, method: Method, pattern: &str, handler: Arc<dyn ApiHandler>) {
        self.routes.push(Route {
            method,
            segments: parse_pattern(pattern),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the handler for a request, returning it with the captured path
    /// parameters.
    pub fn match_request(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<dyn ApiHandler>, HashMap<String, String>)> {
        let segments: Vec<&str> = split_path(path);
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                match_segments(&route.segments, &segments)
                    .map(|params| (Arc::clone(&route.handler), params))
            })
    }
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(segment.to_owned()),
            }
        })
        .collect()
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> Option<HashMap<String, String>> {
    if pattern.len() != path.len() {
        return None;
    }
    let mut params = HashMap::new();
    for (segment, actual) in pattern.iter().zip(path) {
        match segment {
            Segment::Literal(expected) if expected == actual => {}
            Segment::Literal(_) => return None,
            Segment::Param(name) => {
                params.insert(name.clone(), (*actual).to_owned());
            }
        }
    }
    Some(params)
}
