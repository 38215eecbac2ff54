//! Request and response handles shared by context providers and handlers.
//!
//! - `RequestHead`: the method, uri, version and headers of the incoming request
//! - `ResponseHandle`: headers a handler wants added to its successful response

use http::header::{ACCEPT, AsHeaderName};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};

/// The head of an HTTP request: everything but the body.
#[derive(Debug)]
pub struct RequestHead {
    parts: Parts,
}

impl RequestHead {
    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Returns the raw (still percent-encoded) path of the request
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Returns a header value when it is present and visible ASCII
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Decoded query pairs, in the order they appear in the uri.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parts
            .uri
            .query()
            .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
            .unwrap_or_default()
    }

    /// The raw query mapping validated by the pipeline.
    ///
    /// A key given once maps to a string, a repeated key maps to the list of its values.
    pub fn query_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in self.query_pairs() {
            match map.get_mut(&key) {
                None => {
                    map.insert(key, Value::String(value));
                }
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            }
        }
        Value::Object(map)
    }

    /// Whether the client accepts a JSON response.
    ///
    /// A missing `Accept` header accepts anything; otherwise one media range must cover
    /// `application/json` with a non zero quality.
    pub fn accepts_json(&self) -> bool {
        let values = self.parts.headers.get_all(ACCEPT);
        let mut ranges =
            values.iter().filter_map(|value| value.to_str().ok()).flat_map(|value| value.split(',')).peekable();

        if ranges.peek().is_none() {
            return true;
        }

        ranges.filter_map(|range| range.trim().parse::<mime::Mime>().ok()).any(|range| {
            let covers = range.type_() == mime::STAR
                || (range.type_() == mime::APPLICATION
                    && (range.subtype() == mime::STAR || range.subtype() == mime::JSON));
            let refused = range.get_param("q").and_then(|q| q.as_str().parse::<f32>().ok()).is_some_and(|q| q <= 0.0);
            covers && !refused
        })
    }
}

impl From<Parts> for RequestHead {
    fn from(parts: Parts) -> Self {
        Self { parts }
    }
}

/// Headers a handler adds to its response.
///
/// Cloned handles share the same headers; they are applied to 200 and 204 responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    headers: Arc<Mutex<HeaderMap>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner).insert(name, value);
    }

    pub fn headers(&self) -> HeaderMap {
        self.headers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn take_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.headers.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestHead, ResponseHandle};
    use http::{HeaderValue, Request};
    use serde_json::json;

    fn head(uri: &str, accept: Option<&str>) -> RequestHead {
        let mut builder = Request::builder().uri(uri);
        if let Some(accept) = accept {
            builder = builder.header(http::header::ACCEPT, accept);
        }
        builder.body(()).unwrap().into_parts().0.into()
    }

    #[test]
    fn test_query_pairs() {
        let head = head("/echo?message=hello%20query&date=2020-01-01", None);
        assert_eq!(
            head.query_pairs(),
            [("message".to_string(), "hello query".to_string()), ("date".to_string(), "2020-01-01".to_string())]
        );
        assert_eq!(head.path(), "/echo");
    }

    #[test]
    fn test_query_json_repeated_keys() {
        let head = head("/items?tag=a&tag=b&tag=c&page=2", None);
        assert_eq!(head.query_json(), json!({"tag": ["a", "b", "c"], "page": "2"}));
    }

    #[test]
    fn test_query_json_without_query() {
        assert_eq!(head("/items", None).query_json(), json!({}));
    }

    #[test]
    fn test_accepts_json() {
        assert!(head("/", None).accepts_json());
        assert!(head("/", Some("application/json")).accepts_json());
        assert!(head("/", Some("*/*")).accepts_json());
        assert!(head("/", Some("application/*")).accepts_json());
        assert!(head("/", Some("text/html, application/json;q=0.9")).accepts_json());

        assert!(!head("/", Some("text/html")).accepts_json());
        assert!(!head("/", Some("text/html, application/json;q=0")).accepts_json());
    }

    #[test]
    fn test_response_handle_is_shared() {
        let handle = ResponseHandle::new();
        let cloned = handle.clone();
        cloned.insert_header(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        assert_eq!(handle.headers().get(http::header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(handle.take_headers().len(), 1);
        assert!(cloned.headers().is_empty());
    }
}
