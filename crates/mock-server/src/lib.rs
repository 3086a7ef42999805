//! itkit Mock Server - an embedded HTTP stub server for integration tests.
//!
//! A [`MockServer`] is started by its factory and stays up until it is
//! stopped or dropped. Tests register [`StubMapping`]s, point their HTTP
//! client at [`MockServer::url`], and finish with
//! [`MockServer::verify_no_unmatched_requests`] so that any request the
//! stubs did not cover fails the test, with near-miss suggestions when a
//! stub came close.
//!
//! ## Structure
//!
//! - `server` - The handle, its builder and the axum request handler
//! - `config` - Startup options (`MockServerConfig`)
//! - `stub` - Stub mappings and response definitions
//! - `matcher` - Request patterns and distance scoring
//! - `journal` - Captured requests
//! - `near_miss` - Closest-stub suggestions for unmatched requests
//! - `extension` - Response transformers
//! - `error` - Start and verification errors
//!
//! ```no_run
//! use itkit_mock_server::{MockServer, RequestPattern, ResponseDefinition};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::start().await?;
//! server.register(RequestPattern::get("/health").will_return(ResponseDefinition::ok().with_body("OK")));
//!
//! // ... exercise the code under test against server.base_url() ...
//!
//! server.verify_no_unmatched_requests()?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extension;
pub mod journal;
pub mod matcher;
pub mod near_miss;
pub mod server;
pub mod stub;

pub use axum::http::{Method, StatusCode};
pub use config::MockServerConfig;
pub use error::{MockServerError, VerificationError};
pub use extension::ResponseTransformer;
pub use journal::{LoggedRequest, RequestJournal};
pub use matcher::{BodyPattern, FieldDiff, MatchResult, RequestPattern, StringMatcher, UrlPattern};
pub use near_miss::{find_near_misses, NearMiss};
pub use server::{MockServer, MockServerBuilder};
pub use stub::{ResponseDefinition, StubMapping};
