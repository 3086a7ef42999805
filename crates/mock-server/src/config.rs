//! Mock server configuration

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::extension::ResponseTransformer;

/// Journal size used when none is configured.
pub const DEFAULT_JOURNAL_LIMIT: usize = 1000;

/// Options used to build and start a [`MockServer`](crate::MockServer).
#[derive(Clone)]
pub struct MockServerConfig {
    /// Interface to bind
    pub host: IpAddr,
    /// Fixed port, or `None` for an ephemeral port chosen by the OS
    pub port: Option<u16>,
    /// Run response transformers
    pub extensions_enabled: bool,
    /// Journal bound, or `None` for unbounded
    pub max_request_journal_entries: Option<usize>,
    /// Registered response transformers
    pub extensions: Vec<Arc<dyn ResponseTransformer>>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            extensions_enabled: true,
            max_request_journal_entries: Some(DEFAULT_JOURNAL_LIMIT),
            extensions: Vec::new(),
        }
    }
}

impl fmt::Debug for MockServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("extensions_enabled", &self.extensions_enabled)
            .field("max_request_journal_entries", &self.max_request_journal_entries)
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MockServerConfig {
    /// Load configuration from environment variables
    ///
    /// - `MOCK_SERVER_HOST` - bind address (default `127.0.0.1`)
    /// - `MOCK_SERVER_PORT` - port, `0` or unset for ephemeral
    /// - `MOCK_SERVER_JOURNAL_LIMIT` - journal bound, or `unbounded`
    /// - `MOCK_SERVER_EXTENSIONS` - `true`/`false`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("MOCK_SERVER_HOST") {
            config.host = host
                .trim()
                .parse()
                .with_context(|| format!("MOCK_SERVER_HOST must be an IP address, got '{host}'"))?;
        }

        if let Some(port) = lookup("MOCK_SERVER_PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .context("MOCK_SERVER_PORT must be a valid port number")?;
            config.port = (port != 0).then_some(port);
        }

        if let Some(limit) = lookup("MOCK_SERVER_JOURNAL_LIMIT") {
            let limit = limit.trim();
            config.max_request_journal_entries = if limit.eq_ignore_ascii_case("unbounded") {
                None
            } else {
                Some(
                    limit
                        .parse()
                        .context("MOCK_SERVER_JOURNAL_LIMIT must be a number or 'unbounded'")?,
                )
            };
        }

        if let Some(enabled) = lookup("MOCK_SERVER_EXTENSIONS") {
            config.extensions_enabled = match enabled.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => anyhow::bail!("MOCK_SERVER_EXTENSIONS must be true or false, got '{other}'"),
            };
        }

        Ok(config)
    }

    /// Let the OS pick a free port.
    pub fn dynamic_port(mut self) -> Self {
        self.port = None;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn extensions_enabled(mut self, enabled: bool) -> Self {
        self.extensions_enabled = enabled;
        self
    }

    pub fn max_request_journal_entries(mut self, limit: Option<usize>) -> Self {
        self.max_request_journal_entries = limit;
        self
    }

    pub fn with_extension(mut self, extension: Arc<dyn ResponseTransformer>) -> Self {
        self.extensions.push(extension);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = MockServerConfig::default();

        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, None);
        assert!(config.extensions_enabled);
        assert_eq!(config.max_request_journal_entries, Some(DEFAULT_JOURNAL_LIMIT));
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = MockServerConfig::from_lookup(lookup(&[])).expect("config");

        assert_eq!(config.port, None);
        assert_eq!(config.max_request_journal_entries, Some(DEFAULT_JOURNAL_LIMIT));
    }

    #[test]
    fn reads_every_variable() {
        let config = MockServerConfig::from_lookup(lookup(&[
            ("MOCK_SERVER_HOST", "0.0.0.0"),
            ("MOCK_SERVER_PORT", "18080"),
            ("MOCK_SERVER_JOURNAL_LIMIT", "unbounded"),
            ("MOCK_SERVER_EXTENSIONS", "false"),
        ]))
        .expect("config");

        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port, Some(18080));
        assert_eq!(config.max_request_journal_entries, None);
        assert!(!config.extensions_enabled);
    }

    #[test]
    fn zero_port_means_dynamic() {
        let config =
            MockServerConfig::from_lookup(lookup(&[("MOCK_SERVER_PORT", "0")])).expect("config");

        assert_eq!(config.port, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        let error = MockServerConfig::from_lookup(lookup(&[("MOCK_SERVER_PORT", "http")]))
            .expect_err("invalid port");
        assert!(error.to_string().contains("MOCK_SERVER_PORT"));

        let error = MockServerConfig::from_lookup(lookup(&[("MOCK_SERVER_EXTENSIONS", "maybe")]))
            .expect_err("invalid flag");
        assert!(error.to_string().contains("maybe"));
    }
}
