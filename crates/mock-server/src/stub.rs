//! Stub mappings: a request pattern paired with a canned response.

use std::fmt;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use uuid::Uuid;

use crate::matcher::RequestPattern;

/// Priority given to stubs that do not set one. Lower numbers win.
pub const DEFAULT_PRIORITY: u8 = 5;

/// A rule pairing a request matcher with a response.
#[derive(Debug, Clone)]
pub struct StubMapping {
    id: Uuid,
    name: Option<String>,
    priority: u8,
    request: RequestPattern,
    response: ResponseDefinition,
}

impl StubMapping {
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            priority: DEFAULT_PRIORITY,
            request,
            response,
        }
    }

    /// Human-readable name used in diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn request(&self) -> &RequestPattern {
        &self.request
    }

    pub fn response(&self) -> &ResponseDefinition {
        &self.response
    }
}

impl fmt::Display for StubMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "'{name}' ({})", self.request),
            None => write!(f, "{} [{}]", self.request, self.id),
        }
    }
}

/// The canned response a stub serves.
#[derive(Debug, Clone)]
pub struct ResponseDefinition {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
    transformers: Vec<String>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl ResponseDefinition {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
            transformers: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching `content-type` header.
    pub fn with_json_body(self, value: serde_json::Value) -> Self {
        self.with_header(header::CONTENT_TYPE.as_str(), "application/json")
            .with_body(value.to_string())
    }

    /// Wait this long before responding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Opt in to a named [`ResponseTransformer`](crate::ResponseTransformer).
    pub fn with_transformer(mut self, name: impl Into<String>) -> Self {
        self.transformers.push(name.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn transformers(&self) -> &[String] {
        &self.transformers
    }

    pub(crate) fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => {
                    tracing::warn!(header = %name, "Skipping invalid stub response header");
                }
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stub_defaults() {
        let stub = RequestPattern::get("/health").will_return(ResponseDefinition::ok());

        assert_eq!(stub.priority(), DEFAULT_PRIORITY);
        assert_eq!(stub.name(), None);
        assert_eq!(stub.response().status(), StatusCode::OK);
    }

    #[test]
    fn each_stub_gets_its_own_id() {
        let a = RequestPattern::get("/a").will_return(ResponseDefinition::ok());
        let b = RequestPattern::get("/a").will_return(ResponseDefinition::ok());

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn display_prefers_name() {
        let stub = RequestPattern::post("/orders")
            .will_return(ResponseDefinition::new(StatusCode::CREATED))
            .with_name("create order");

        assert_eq!(stub.to_string(), "'create order' (POST path /orders)");
    }

    #[test]
    fn json_body_sets_content_type() {
        let response = ResponseDefinition::ok().with_json_body(json!({"id": 7}));

        assert_eq!(response.body().as_ref(), br#"{"id":7}"#);
        assert_eq!(
            response.headers(),
            &[("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn into_response_skips_invalid_headers() {
        let response = ResponseDefinition::new(StatusCode::ACCEPTED)
            .with_header("x-valid", "yes")
            .with_header("bad header", "no")
            .into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers().get("x-valid").map(|v| v.as_bytes()), Some(&b"yes"[..]));
        assert_eq!(response.headers().len(), 1);
    }
}
