//! Layered variable resolution.
//!
//! Precedence, highest first:
//! 1. the environment source (the process environment by default)
//! 2. the file-backed store
//! 3. the caller-supplied default
//!
//! The environment wins so that values injected by CI are never shadowed by
//! a checked-in file.

use crate::config::EnvConfig;
use crate::env_file::EnvFile;
use crate::properties;
use crate::source::{EnvSource, ProcessEnv};

/// Resolves variable names across the environment, a `.env` file and defaults.
#[derive(Debug, Clone)]
pub struct Environment<S = ProcessEnv> {
    source: S,
    file: EnvFile,
    empty_is_unset: bool,
    populated_properties: bool,
}

impl Environment<ProcessEnv> {
    /// Build a resolver over the process environment.
    ///
    /// Reads the configured file once. When `populate_properties` is set, every
    /// parsed entry is also written to the process-wide property registry.
    pub fn load(config: EnvConfig) -> Self {
        Self::with_source(ProcessEnv, config)
    }
}

impl<S: EnvSource> Environment<S> {
    /// Build a resolver over an arbitrary environment source.
    pub fn with_source(source: S, config: EnvConfig) -> Self {
        let file = match &config.file {
            Some(path) => EnvFile::load(path),
            None => EnvFile::empty(),
        };
        Self::from_parts(source, file, &config)
    }

    /// Build a resolver from an already loaded store.
    pub fn from_parts(source: S, file: EnvFile, config: &EnvConfig) -> Self {
        if config.populate_properties {
            let written = properties::extend(file.iter());
            tracing::debug!(written, "Populated process properties from env file");
        }

        Self {
            source,
            file,
            empty_is_unset: config.empty_is_unset,
            populated_properties: config.populate_properties,
        }
    }

    /// Look up `name`; `None` when neither the environment nor the file has it.
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.from_source(name) {
            return Some(value);
        }
        self.file.get(name).map(str::to_owned)
    }

    /// Look up `name`, falling back to `default` when it is defined nowhere.
    pub fn get_or(&self, name: &str, default: impl Into<String>) -> String {
        self.get(name).unwrap_or_else(|| default.into())
    }

    /// Look up `name` with an optional default.
    ///
    /// A `None` default behaves exactly like [`get`](Self::get).
    pub fn get_with_default(&self, name: &str, default: Option<&str>) -> Option<String> {
        self.get(name).or_else(|| default.map(str::to_owned))
    }

    /// Whether `name` resolves from the environment or the file.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The file-backed store.
    pub fn file(&self) -> &EnvFile {
        &self.file
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether the file entries were mirrored into the property registry.
    pub fn populated_properties(&self) -> bool {
        self.populated_properties
    }

    fn from_source(&self, name: &str) -> Option<String> {
        self.source
            .var(name)
            .filter(|value| !(self.empty_is_unset && value.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn resolver(env: &[(&str, &str)], file: &[(&str, &str)]) -> Environment<HashMap<String, String>> {
        Environment::from_parts(
            env_map(env),
            EnvFile::from_pairs(file.iter().copied()),
            &EnvConfig::default(),
        )
    }

    #[test]
    fn environment_wins_over_file() {
        let env = resolver(&[("TOKEN", "from-env")], &[("TOKEN", "from-file")]);

        assert_eq!(env.get("TOKEN").as_deref(), Some("from-env"));
        assert_eq!(env.get_or("TOKEN", "default"), "from-env");
    }

    #[test]
    fn file_value_used_when_environment_lacks_name() {
        let env = resolver(&[], &[("FOO", "bar")]);

        assert_eq!(env.get("FOO").as_deref(), Some("bar"));
        assert_eq!(env.get_or("FOO", "baz"), "bar");
    }

    #[test]
    fn default_used_only_when_name_is_undefined() {
        let env = resolver(&[], &[("FOO", "bar")]);

        assert_eq!(env.get("BAZ"), None);
        assert_eq!(env.get_or("BAZ", "qux"), "qux");
        assert!(!env.contains("BAZ"));
    }

    #[test]
    fn absent_default_behaves_like_plain_get() {
        let env = resolver(&[], &[("FOO", "bar")]);

        assert_eq!(env.get_with_default("BAZ", None), None);
        assert_eq!(env.get_with_default("BAZ", Some("qux")).as_deref(), Some("qux"));
        assert_eq!(env.get_with_default("FOO", None).as_deref(), Some("bar"));
        assert_eq!(env.get_with_default("FOO", Some("qux")).as_deref(), Some("bar"));
    }

    #[test]
    fn empty_environment_value_falls_through_by_default() {
        let env = resolver(&[("FOO", "")], &[("FOO", "bar")]);

        assert_eq!(env.get("FOO").as_deref(), Some("bar"));
    }

    #[test]
    fn empty_environment_value_counts_when_configured() {
        let env = Environment::from_parts(
            env_map(&[("FOO", "")]),
            EnvFile::from_pairs([("FOO", "bar")]),
            &EnvConfig::default().empty_is_unset(false),
        );

        assert_eq!(env.get("FOO").as_deref(), Some(""));
    }

    #[test]
    fn environment_is_read_on_every_lookup() {
        let _lock = crate::env_lock();
        let name = "ITKIT_ENVIRONMENT_LIVE_LOOKUP";
        let env = Environment::from_parts(
            ProcessEnv,
            EnvFile::from_pairs([(name, "from-file")]),
            &EnvConfig::default(),
        );

        assert_eq!(env.get(name).as_deref(), Some("from-file"));

        std::env::set_var(name, "from-env");
        assert_eq!(env.get(name).as_deref(), Some("from-env"));

        std::env::remove_var(name);
        assert_eq!(env.get(name).as_deref(), Some("from-file"));
    }

    #[test]
    fn load_reads_configured_file() {
        let _lock = crate::env_lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.env");
        fs::write(&path, "ITKIT_LOAD_FOO=bar\nnot a valid line\n").expect("write env file");

        let env = Environment::load(EnvConfig::default().with_file(&path));

        assert_eq!(env.get("ITKIT_LOAD_FOO").as_deref(), Some("bar"));
        assert_eq!(env.get_or("ITKIT_LOAD_BAZ", "qux"), "qux");
        assert_eq!(env.file().path(), Some(path.as_path()));
    }

    #[test]
    fn missing_file_leaves_only_environment_and_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = Environment::with_source(
            env_map(&[("PRESENT", "yes")]),
            EnvConfig::default().with_file(dir.path().join("missing.env")),
        );

        assert!(env.file().is_empty());
        assert_eq!(env.get("PRESENT").as_deref(), Some("yes"));
        assert_eq!(env.get("ABSENT"), None);
    }

    #[test]
    fn without_file_skips_loading() {
        let env = Environment::with_source(env_map(&[]), EnvConfig::default().without_file());

        assert!(env.file().is_empty());
        assert_eq!(env.file().path(), None);
    }

    #[test]
    fn populate_properties_mirrors_file_entries_once() {
        let key = "itkit.environment.populate.key";
        let env = Environment::from_parts(
            env_map(&[]),
            EnvFile::from_pairs([(key, "value")]),
            &EnvConfig::default().populate_properties(true),
        );

        assert!(env.populated_properties());
        assert_eq!(properties::get(key).as_deref(), Some("value"));

        // Later lookups never write again.
        properties::remove(key);
        assert_eq!(env.get(key).as_deref(), Some("value"));
        assert_eq!(properties::get(key), None);
    }

    #[test]
    fn properties_untouched_when_population_disabled() {
        let key = "itkit.environment.no_populate.key";
        let env = Environment::from_parts(
            env_map(&[]),
            EnvFile::from_pairs([(key, "value")]),
            &EnvConfig::default(),
        );

        assert!(!env.populated_properties());
        assert_eq!(properties::get(key), None);
    }
}
