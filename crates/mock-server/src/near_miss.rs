//! Near-miss detection.
//!
//! For a request no stub matched, rank the registered stubs by how close
//! they came. Only candidates under [`NEAR_MISS_THRESHOLD`] are reported, at
//! most [`MAX_NEAR_MISSES`] per request, closest first.

use std::fmt;

use crate::journal::LoggedRequest;
use crate::matcher::FieldDiff;
use crate::stub::StubMapping;

/// Stubs at or above this distance are not considered close.
pub const NEAR_MISS_THRESHOLD: f64 = 0.5;

/// Upper bound on suggestions per request.
pub const MAX_NEAR_MISSES: usize = 3;

/// A stub that almost matched a request.
#[derive(Debug, Clone)]
pub struct NearMiss {
    pub request: LoggedRequest,
    pub stub: StubMapping,
    /// `0.0` would be an exact match.
    pub distance: f64,
    /// The fields that kept the stub from matching.
    pub diffs: Vec<FieldDiff>,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.request)?;
        write!(f, "  closest stub: {} (distance {:.2})", self.stub, self.distance)?;
        for diff in &self.diffs {
            write!(f, "\n    {diff}")?;
        }
        Ok(())
    }
}

/// Rank `stubs` by closeness to `request`.
pub fn find_near_misses(request: &LoggedRequest, stubs: &[StubMapping]) -> Vec<NearMiss> {
    let mut candidates: Vec<NearMiss> = stubs
        .iter()
        .filter_map(|stub| {
            let result = stub.request().evaluate(request);
            (result.distance < NEAR_MISS_THRESHOLD).then(|| NearMiss {
                request: request.clone(),
                stub: stub.clone(),
                distance: result.distance,
                diffs: result.diffs,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(MAX_NEAR_MISSES);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{BodyPattern, RequestPattern};
    use crate::stub::ResponseDefinition;
    use axum::http::Method;
    use serde_json::json;

    fn stub(pattern: RequestPattern) -> StubMapping {
        pattern.will_return(ResponseDefinition::ok())
    }

    #[test]
    fn no_stubs_no_near_misses() {
        let request = LoggedRequest::new(Method::GET, "/users");

        assert!(find_near_misses(&request, &[]).is_empty());
    }

    #[test]
    fn same_path_different_method_is_reported() {
        let request = LoggedRequest::new(Method::GET, "/users");
        let stubs = vec![stub(RequestPattern::post("/users"))];

        let misses = find_near_misses(&request, &stubs);

        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].stub.id(), stubs[0].id());
        assert_eq!(misses[0].diffs[0].field, "method");
    }

    #[test]
    fn same_method_different_body_is_reported() {
        let request = LoggedRequest::new(Method::POST, "/orders").with_body(r#"{"sku":"abc","qty":1}"#);
        let stubs = vec![stub(
            RequestPattern::post("/orders").with_body(BodyPattern::equal_to_json(json!({"sku": "abc", "qty": 2}))),
        )];

        let misses = find_near_misses(&request, &stubs);

        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].diffs[0].field, "body");
    }

    #[test]
    fn distant_stubs_are_ignored() {
        let request = LoggedRequest::new(Method::GET, "/users");
        let stubs = vec![stub(RequestPattern::delete("/billing/invoices/2024"))];

        assert!(find_near_misses(&request, &stubs).is_empty());
    }

    #[test]
    fn sorted_closest_first_and_capped() {
        let request = LoggedRequest::new(Method::GET, "/users/1");
        let stubs = vec![
            stub(RequestPattern::post("/users/2")),
            stub(RequestPattern::post("/users/1")),
            stub(RequestPattern::get("/users/2")),
            stub(RequestPattern::put("/users/1")),
            stub(RequestPattern::delete("/users/1")),
        ];

        let misses = find_near_misses(&request, &stubs);

        assert_eq!(misses.len(), MAX_NEAR_MISSES);
        assert_eq!(misses[0].stub.id(), stubs[2].id());
        assert!(misses.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn display_lists_request_stub_and_diffs() {
        let request = LoggedRequest::new(Method::GET, "/users");
        let stubs = vec![stub(RequestPattern::post("/users")).with_name("create user")];

        let rendered = find_near_misses(&request, &stubs)[0].to_string();

        assert!(rendered.contains("GET /users"));
        assert!(rendered.contains("'create user'"));
        assert!(rendered.contains("method: expected POST, was GET"));
    }
}
