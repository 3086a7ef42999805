//! Environment loading configuration

use std::path::{Path, PathBuf};

/// Default file name looked up relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Options controlling how an [`Environment`](crate::Environment) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// Location of the `.env` file, or `None` to skip file loading entirely
    pub file: Option<PathBuf>,
    /// Mirror parsed file entries into the process-wide property registry
    pub populate_properties: bool,
    /// Treat an environment variable set to the empty string as unset
    pub empty_is_unset: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            populate_properties: false,
            empty_is_unset: true,
        }
    }
}

impl EnvConfig {
    /// Read entries from the given file instead of `./.env`.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Do not read any file; only the environment and defaults apply.
    pub fn without_file(mut self) -> Self {
        self.file = None;
        self
    }

    pub fn populate_properties(mut self, enabled: bool) -> Self {
        self.populate_properties = enabled;
        self
    }

    pub fn empty_is_unset(mut self, enabled: bool) -> Self {
        self.empty_is_unset = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reads_dot_env_without_side_effects() {
        let config = EnvConfig::default();

        assert_eq!(config.file.as_deref(), Some(Path::new(".env")));
        assert!(!config.populate_properties);
        assert!(config.empty_is_unset);
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = EnvConfig::default()
            .with_file("config/test.env")
            .populate_properties(true)
            .empty_is_unset(false);

        assert_eq!(config.file.as_deref(), Some(Path::new("config/test.env")));
        assert!(config.populate_properties);
        assert!(!config.empty_is_unset);

        assert_eq!(config.without_file().file, None);
    }
}
