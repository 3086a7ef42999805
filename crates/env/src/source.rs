//! Environment sources.
//!
//! The resolver never caches what a source returns, so a source is asked on
//! every lookup. `ProcessEnv` is the real thing; a `HashMap` works as a fixed
//! stand-in when a test must not touch the process environment.

use std::collections::HashMap;

/// Read-only access to a set of environment variables.
///
/// Does **not** require `Send + Sync`; add the bounds at the call site when
/// an [`Environment`](crate::Environment) has to cross threads.
pub trait EnvSource {
    /// Current value of `name`, or `None` when it is not set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: EnvSource + ?Sized> EnvSource for &S {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_env_reads_live_values() {
        let _lock = crate::env_lock();
        let name = "ITKIT_ENV_SOURCE_PROCESS_LIVE";
        assert_eq!(ProcessEnv.var(name), None);

        std::env::set_var(name, "first");
        assert_eq!(ProcessEnv.var(name).as_deref(), Some("first"));

        std::env::set_var(name, "second");
        assert_eq!(ProcessEnv.var(name).as_deref(), Some("second"));

        std::env::remove_var(name);
        assert_eq!(ProcessEnv.var(name), None);
    }

    #[test]
    fn map_source_returns_owned_values() {
        let map = HashMap::from([("KEY".to_string(), "value".to_string())]);

        assert_eq!(map.var("KEY").as_deref(), Some("value"));
        assert_eq!(map.var("OTHER"), None);
        assert_eq!((&map).var("KEY").as_deref(), Some("value"));
    }
}
