//! Response extensions.
//!
//! Transformers rewrite a stub's response just before it is served. Global
//! transformers run for every matched stub; the others only for stubs that
//! name them via [`ResponseDefinition::with_transformer`]. None run when
//! extensions are disabled in the server config.

use std::sync::Arc;

use crate::journal::LoggedRequest;
use crate::stub::ResponseDefinition;

/// Hook that rewrites stub responses.
pub trait ResponseTransformer: Send + Sync {
    /// Name stubs use to opt in.
    fn name(&self) -> &str;

    /// Whether to run for every stub instead of only those naming it.
    fn applies_globally(&self) -> bool {
        false
    }

    fn transform(&self, request: &LoggedRequest, response: ResponseDefinition) -> ResponseDefinition;
}

/// Run every applicable transformer over `response`, in registration order.
pub(crate) fn apply(
    transformers: &[Arc<dyn ResponseTransformer>],
    request: &LoggedRequest,
    response: ResponseDefinition,
) -> ResponseDefinition {
    transformers.iter().fold(response, |response, transformer| {
        let requested = response
            .transformers()
            .iter()
            .any(|name| name == transformer.name());
        if transformer.applies_globally() || requested {
            tracing::trace!(transformer = transformer.name(), "Applying response transformer");
            transformer.transform(request, response)
        } else {
            response
        }
    })
}
