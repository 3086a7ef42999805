//! Error types for the mock server.

use std::fmt::Write as _;
use std::net::SocketAddr;

use crate::journal::LoggedRequest;
use crate::near_miss::NearMiss;

/// Errors starting the mock server.
#[derive(Debug, thiserror::Error)]
pub enum MockServerError {
    /// The listener could not be bound - includes the address for actionable messages.
    #[error("Failed to bind mock server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A pre-bound listener could not be adopted.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MockServerError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}

/// The journal held requests no stub matched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    /// At least one unmatched request had a close stub.
    #[error("{}", render_near_misses(.near_misses, .unmatched))]
    NearMisses {
        near_misses: Vec<NearMiss>,
        unmatched: Vec<LoggedRequest>,
    },

    /// No stub came close to any unmatched request.
    #[error("{}", render_unmatched(.0))]
    UnmatchedRequests(Vec<LoggedRequest>),
}

impl VerificationError {
    /// Every unmatched request found during verification.
    pub fn unmatched_requests(&self) -> &[LoggedRequest] {
        match self {
            Self::NearMisses { unmatched, .. } => unmatched,
            Self::UnmatchedRequests(unmatched) => unmatched,
        }
    }

    /// Near-miss suggestions, empty for `UnmatchedRequests`.
    pub fn near_misses(&self) -> &[NearMiss] {
        match self {
            Self::NearMisses { near_misses, .. } => near_misses,
            Self::UnmatchedRequests(_) => &[],
        }
    }
}

fn render_near_misses(near_misses: &[NearMiss], unmatched: &[LoggedRequest]) -> String {
    let mut out = format!(
        "{} unmatched request(s), {} near miss(es):",
        unmatched.len(),
        near_misses.len()
    );
    for near_miss in near_misses {
        let _ = write!(out, "\n\n{near_miss}");
    }

    let mut without_near_miss = unmatched
        .iter()
        .filter(|request| !near_misses.iter().any(|near_miss| near_miss.request.id == request.id))
        .peekable();
    if without_near_miss.peek().is_some() {
        out.push_str("\n\nNo close stub:");
        for request in without_near_miss {
            let _ = write!(out, "\n  {request}");
        }
    }
    out
}

fn render_unmatched(unmatched: &[LoggedRequest]) -> String {
    let mut out = format!("{} unmatched request(s):", unmatched.len());
    for request in unmatched {
        let _ = write!(out, "\n  {request}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::RequestPattern;
    use crate::near_miss::find_near_misses;
    use crate::stub::ResponseDefinition;
    use axum::http::Method;

    #[test]
    fn unmatched_message_lists_each_request() {
        let error = VerificationError::UnmatchedRequests(vec![
            LoggedRequest::new(Method::GET, "/first"),
            LoggedRequest::new(Method::DELETE, "/second?force=true"),
        ]);

        let message = error.to_string();
        assert!(message.starts_with("2 unmatched request(s):"));
        assert!(message.contains("GET /first"));
        assert!(message.contains("DELETE /second?force=true"));
        assert!(error.near_misses().is_empty());
        assert_eq!(error.unmatched_requests().len(), 2);
    }

    #[test]
    fn near_miss_message_also_lists_requests_without_a_close_stub() {
        let close = LoggedRequest::new(Method::GET, "/orders");
        let unrelated = LoggedRequest::new(Method::GET, "/completely/unrelated/thing/xyz");
        let stub = RequestPattern::post("/orders").will_return(ResponseDefinition::ok());
        let near_misses = find_near_misses(&close, std::slice::from_ref(&stub));
        assert_eq!(near_misses.len(), 1);

        let error = VerificationError::NearMisses {
            near_misses,
            unmatched: vec![close, unrelated],
        };

        let message = error.to_string();
        assert!(message.starts_with("2 unmatched request(s), 1 near miss(es):"));
        assert!(message.contains("closest stub"));
        assert!(message.contains("No close stub:\n  GET /completely/unrelated/thing/xyz"));
        assert_eq!(message.matches("GET /orders").count(), 1);
    }

    #[test]
    fn bind_error_names_address() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().expect("socket addr");
        let error = MockServerError::bind(
            addr,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );

        assert_eq!(
            error.to_string(),
            "Failed to bind mock server to 127.0.0.1:8080: address in use"
        );
    }
}
