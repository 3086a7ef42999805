//! Request matching.
//!
//! A [`RequestPattern`] is evaluated against a [`LoggedRequest`] field by
//! field. Each field yields whether it matched and a distance in `[0, 1]`;
//! the weighted mean of those distances is what near-miss ranking uses.

use std::fmt;

use axum::http::Method;
use regex_lite::Regex;

use crate::journal::{preview, LoggedRequest};
use crate::stub::{ResponseDefinition, StubMapping};

const URL_WEIGHT: f64 = 3.0;
const METHOD_WEIGHT: f64 = 1.0;
const HEADER_WEIGHT: f64 = 1.0;
const QUERY_WEIGHT: f64 = 1.0;
const BODY_WEIGHT: f64 = 1.0;

/// Strings are truncated to this many chars before computing edit distance.
const MAX_DISTANCE_CHARS: usize = 1024;

/// How the request URL must look.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Any URL.
    Any,
    /// Path and query string exactly as given.
    Equal(String),
    /// Path exactly as given, query ignored.
    Path(String),
    /// Path starting with the given prefix.
    PathPrefix(String),
    /// Path matching a regular expression.
    PathRegex(Regex),
}

impl UrlPattern {
    pub fn path_regex(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self::PathRegex(Regex::new(pattern)?))
    }

    fn evaluate(&self, request: &LoggedRequest) -> FieldMatch {
        match self {
            Self::Any => FieldMatch::exact(),
            Self::Equal(url) => FieldMatch::strings(url, &request.url),
            Self::Path(path) => FieldMatch::strings(path, &request.path),
            Self::PathPrefix(prefix) => {
                if request.path.starts_with(prefix.as_str()) {
                    FieldMatch::exact()
                } else {
                    FieldMatch::miss(normalized_distance(prefix, &request.path))
                }
            }
            Self::PathRegex(regex) => FieldMatch::boolean(regex.is_match(&request.path)),
        }
    }

    fn actual<'a>(&self, request: &'a LoggedRequest) -> &'a str {
        match self {
            Self::Equal(_) => &request.url,
            _ => &request.path,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any URL"),
            Self::Equal(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "path {path}"),
            Self::PathPrefix(prefix) => write!(f, "path starting with {prefix}"),
            Self::PathRegex(regex) => write!(f, "path matching /{}/", regex.as_str()),
        }
    }
}

/// Matcher for a single header or query parameter value.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    EqualTo(String),
    Contains(String),
    Matches(Regex),
    /// Present with any value.
    Present,
}

impl StringMatcher {
    pub fn equal_to(value: impl Into<String>) -> Self {
        Self::EqualTo(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains(value.into())
    }

    pub fn matches(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self::Matches(Regex::new(pattern)?))
    }

    fn evaluate(&self, actual: Option<&str>) -> FieldMatch {
        let Some(actual) = actual else {
            return FieldMatch::miss(1.0);
        };
        match self {
            Self::EqualTo(expected) => FieldMatch::strings(expected, actual),
            Self::Contains(expected) => {
                if actual.contains(expected.as_str()) {
                    FieldMatch::exact()
                } else {
                    FieldMatch::miss(normalized_distance(expected, actual))
                }
            }
            Self::Matches(regex) => FieldMatch::boolean(regex.is_match(actual)),
            Self::Present => FieldMatch::exact(),
        }
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EqualTo(value) => write!(f, "{value:?}"),
            Self::Contains(value) => write!(f, "containing {value:?}"),
            Self::Matches(regex) => write!(f, "matching /{}/", regex.as_str()),
            Self::Present => write!(f, "present"),
        }
    }
}

/// Matcher for the request body.
#[derive(Debug, Clone)]
pub enum BodyPattern {
    EqualTo(String),
    Contains(String),
    /// Semantically equal JSON; key order and whitespace are ignored.
    EqualToJson(serde_json::Value),
}

impl BodyPattern {
    pub fn equal_to(body: impl Into<String>) -> Self {
        Self::EqualTo(body.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    pub fn equal_to_json(value: serde_json::Value) -> Self {
        Self::EqualToJson(value)
    }

    fn evaluate(&self, body: &str) -> FieldMatch {
        match self {
            Self::EqualTo(expected) => FieldMatch::strings(expected, body),
            Self::Contains(fragment) => {
                if body.contains(fragment.as_str()) {
                    FieldMatch::exact()
                } else {
                    FieldMatch::miss(normalized_distance(fragment, body))
                }
            }
            Self::EqualToJson(expected) => match serde_json::from_str::<serde_json::Value>(body) {
                Ok(actual) if actual == *expected => FieldMatch::exact(),
                Ok(actual) => {
                    FieldMatch::miss(normalized_distance(&expected.to_string(), &actual.to_string()))
                }
                Err(_) => FieldMatch::miss(1.0),
            },
        }
    }
}

impl fmt::Display for BodyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EqualTo(body) => write!(f, "{}", preview(body)),
            Self::Contains(fragment) => write!(f, "containing {}", preview(fragment)),
            Self::EqualToJson(value) => write!(f, "JSON {}", preview(&value.to_string())),
        }
    }
}

/// What a request must look like for a stub to serve it.
#[derive(Debug, Clone)]
pub struct RequestPattern {
    method: Option<Method>,
    url: UrlPattern,
    headers: Vec<(String, StringMatcher)>,
    query: Vec<(String, StringMatcher)>,
    body: Option<BodyPattern>,
}

impl RequestPattern {
    /// `method` of `None` accepts any method.
    pub fn new(method: Option<Method>, url: UrlPattern) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Some(Method::GET), UrlPattern::Path(path.into()))
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Some(Method::POST), UrlPattern::Path(path.into()))
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Some(Method::PUT), UrlPattern::Path(path.into()))
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Some(Method::PATCH), UrlPattern::Path(path.into()))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Some(Method::DELETE), UrlPattern::Path(path.into()))
    }

    /// Any method on the given path.
    pub fn any(path: impl Into<String>) -> Self {
        Self::new(None, UrlPattern::Path(path.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, matcher: StringMatcher) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), matcher));
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, matcher: StringMatcher) -> Self {
        self.query.push((name.into(), matcher));
        self
    }

    pub fn with_body(mut self, body: BodyPattern) -> Self {
        self.body = Some(body);
        self
    }

    /// Pair this pattern with a response.
    pub fn will_return(self, response: ResponseDefinition) -> StubMapping {
        StubMapping::new(self, response)
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn url(&self) -> &UrlPattern {
        &self.url
    }

    /// Whether `request` satisfies every part of the pattern.
    pub fn matches(&self, request: &LoggedRequest) -> bool {
        self.evaluate(request).matched
    }

    /// Compare every part of the pattern against `request`.
    pub fn evaluate(&self, request: &LoggedRequest) -> MatchResult {
        let mut result = MatchResult::default();

        let method = match &self.method {
            Some(expected) => FieldMatch::boolean(*expected == request.method),
            None => FieldMatch::exact(),
        };
        result.add(METHOD_WEIGHT, method, || FieldDiff {
            field: "method".to_string(),
            expected: self
                .method
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "any".to_string()),
            actual: request.method.to_string(),
        });

        let url = self.url.evaluate(request);
        result.add(URL_WEIGHT, url, || FieldDiff {
            field: "url".to_string(),
            expected: self.url.to_string(),
            actual: self.url.actual(request).to_string(),
        });

        for (name, matcher) in &self.headers {
            let actual = request.header(name);
            result.add(HEADER_WEIGHT, matcher.evaluate(actual), || FieldDiff {
                field: format!("header {name}"),
                expected: matcher.to_string(),
                actual: describe_actual(actual),
            });
        }

        for (name, matcher) in &self.query {
            let actual = request.query_param(name);
            result.add(QUERY_WEIGHT, matcher.evaluate(actual), || FieldDiff {
                field: format!("query {name}"),
                expected: matcher.to_string(),
                actual: describe_actual(actual),
            });
        }

        if let Some(pattern) = &self.body {
            let body = request.body_text();
            result.add(BODY_WEIGHT, pattern.evaluate(&body), || FieldDiff {
                field: "body".to_string(),
                expected: pattern.to_string(),
                actual: if body.is_empty() {
                    "<empty>".to_string()
                } else {
                    preview(&body)
                },
            });
        }

        result.finish()
    }
}

impl fmt::Display for RequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} {}", self.url),
            None => write!(f, "ANY {}", self.url),
        }
    }
}

fn describe_actual(actual: Option<&str>) -> String {
    match actual {
        Some(value) => format!("{value:?}"),
        None => "<absent>".to_string(),
    }
}

/// One field of a pattern that did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, was {}", self.field, self.expected, self.actual)
    }
}

/// Outcome of evaluating a pattern against a request.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub matched: bool,
    /// Weighted mean distance, `0.0` for an exact match.
    pub distance: f64,
    /// Fields that did not match.
    pub diffs: Vec<FieldDiff>,
    weighted: f64,
    total_weight: f64,
    failed: bool,
}

impl MatchResult {
    fn add(&mut self, weight: f64, field: FieldMatch, diff: impl FnOnce() -> FieldDiff) {
        self.weighted += weight * field.distance;
        self.total_weight += weight;
        if !field.matched {
            self.failed = true;
            self.diffs.push(diff());
        }
    }

    fn finish(mut self) -> Self {
        self.matched = !self.failed;
        self.distance = if self.total_weight > 0.0 {
            self.weighted / self.total_weight
        } else {
            0.0
        };
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldMatch {
    matched: bool,
    distance: f64,
}

impl FieldMatch {
    fn exact() -> Self {
        Self {
            matched: true,
            distance: 0.0,
        }
    }

    fn miss(distance: f64) -> Self {
        Self {
            matched: false,
            distance: distance.clamp(0.0, 1.0),
        }
    }

    fn boolean(matched: bool) -> Self {
        if matched {
            Self::exact()
        } else {
            Self::miss(1.0)
        }
    }

    fn strings(expected: &str, actual: &str) -> Self {
        if expected == actual {
            Self::exact()
        } else {
            Self::miss(normalized_distance(expected, actual))
        }
    }
}

/// Levenshtein distance divided by the longer length, in `[0, 1]`.
pub(crate) fn normalized_distance(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().take(MAX_DISTANCE_CHARS).collect();
    let b: Vec<char> = b.chars().take(MAX_DISTANCE_CHARS).collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()] as f64 / longest as f64
}
