//! File-backed key/value store.
//!
//! Parsing is delegated to `dotenvy`. Loading is tolerant: a missing file
//! yields an empty store and a line `dotenvy` cannot parse is skipped, so the
//! same test suite runs whether or not a local `.env` exists.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Immutable key/value pairs parsed once from a `.env` style file.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    path: Option<PathBuf>,
    entries: HashMap<String, String>,
}

impl EnvFile {
    /// An empty store not backed by any file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the file at `path`.
    ///
    /// Never fails. Later duplicates of a key override earlier ones.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut entries = HashMap::new();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), "No env file found, using empty store");
                } else {
                    tracing::warn!(path = %path.display(), error = %e, "Env file unreadable, using empty store");
                }
                return Self {
                    path: Some(path.to_path_buf()),
                    entries,
                };
            }
        };

        let skipped = parse_entries(path, &contents, &mut entries);

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            skipped,
            "Loaded env file"
        );

        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    /// Build a store from in-memory pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: None,
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when the file does not define it.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Path the store was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse `contents` into `entries`, returning how many entries were skipped.
///
/// An unterminated quote makes `dotenvy` swallow the rest of the input as one
/// bad entry. That entry is then a suffix of the input, so parsing resumes on
/// the line after the one that opened the quote.
fn parse_entries(path: &Path, contents: &str, entries: &mut HashMap<String, String>) -> usize {
    let mut skipped = 0;
    let mut rest = contents;

    loop {
        let mut resume_at = None;
        for item in dotenvy::from_read_iter(rest.as_bytes()) {
            resume_at = None;
            match item {
                Ok((key, value)) => {
                    entries.insert(key, value);
                }
                Err(dotenvy::Error::LineParse(line, _)) => {
                    skipped += 1;
                    tracing::warn!(path = %path.display(), "Skipping malformed env file line");
                    if rest.ends_with(line.as_str()) {
                        resume_at = line.split_once('\n').map(|(_, tail)| rest.len() - tail.len());
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Stopped reading env file");
                    return skipped;
                }
            }
        }

        match resume_at {
            Some(offset) if offset < rest.len() => rest = &rest[offset..],
            _ => return skipped,
        }
    }
}
