//! itkit Env - environment lookups for integration tests.
//!
//! Resolves variable names against the process environment first, then a
//! local `.env` file, then an optional caller-supplied default. The file is
//! parsed once; a missing file or malformed lines never fail test setup.
//!
//! ## Structure
//!
//! - `config` - Loading options (`EnvConfig`)
//! - `source` - Where "the environment" comes from (`EnvSource`)
//! - `env_file` - The immutable file-backed store
//! - `environment` - The resolver (`Environment`)
//! - `properties` - Process-wide property registry, optionally populated from the file
//!
//! ```no_run
//! use itkit_env::{EnvConfig, Environment};
//!
//! let env = Environment::load(EnvConfig::default());
//! let url = env.get_or("API_URL", "http://localhost:8080");
//! ```

pub mod config;
pub mod env_file;
pub mod environment;
pub mod properties;
pub mod source;

pub use config::EnvConfig;
pub use env_file::EnvFile;
pub use environment::Environment;
pub use source::{EnvSource, ProcessEnv};

/// Serializes tests that read or write the real process environment.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
