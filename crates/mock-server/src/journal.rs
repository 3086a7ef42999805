//! Request journal.
//!
//! Every request the server receives is logged here, matched or not. The
//! journal is bounded: once the limit is reached the oldest entry is evicted.

use std::collections::VecDeque;
use std::fmt;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Longest body prefix shown when a request is rendered in a report.
const BODY_PREVIEW_CHARS: usize = 200;

/// A request captured by the mock server.
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub id: Uuid,
    pub method: Method,
    /// Path plus query string, as received.
    pub url: String,
    pub path: String,
    /// Decoded query parameters in order of appearance.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
    /// Stub that served this request, `None` when nothing matched.
    pub matched_stub_id: Option<Uuid>,
}

impl LoggedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (url.clone(), Vec::new()),
        };

        Self {
            id: Uuid::new_v4(),
            method,
            url,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            received_at: Utc::now(),
            matched_stub_id: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as UTF-8, lossy.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn was_matched(&self) -> bool {
        self.matched_stub_id.is_some()
    }

    pub(crate) fn body_preview(&self) -> String {
        preview(&self.body_text())
    }
}

impl fmt::Display for LoggedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if !self.body.is_empty() {
            write!(f, "\n    body: {}", self.body_preview())?;
        }
        Ok(())
    }
}

pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() <= BODY_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

/// Decode a query string into ordered pairs.
///
/// Malformed escapes are kept verbatim rather than rejected.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Bounded, oldest-first log of received requests.
#[derive(Debug, Clone, Default)]
pub struct RequestJournal {
    entries: VecDeque<LoggedRequest>,
    limit: Option<usize>,
}

impl RequestJournal {
    /// A journal keeping at most `limit` entries (`None` for unbounded).
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Append a request, evicting the oldest entries past the limit.
    pub fn record(&mut self, request: LoggedRequest) {
        if self.limit == Some(0) {
            return;
        }
        self.entries.push_back(request);
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }

    pub fn all(&self) -> Vec<LoggedRequest> {
        self.entries.iter().cloned().collect()
    }

    /// Requests that matched no stub, oldest first.
    pub fn unmatched(&self) -> Vec<LoggedRequest> {
        self.entries
            .iter()
            .filter(|r| !r.was_matched())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
