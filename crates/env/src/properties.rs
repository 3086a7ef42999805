//! Process-wide property registry.
//!
//! A global string map that code outside an [`Environment`](crate::Environment)
//! can consult for ambient configuration. It is only written by
//! `Environment::load` when [`EnvConfig::populate_properties`](crate::EnvConfig)
//! is set, or explicitly through [`set`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;

static PROPERTIES: Lazy<RwLock<HashMap<String, String>>> = Lazy::new(Default::default);

/// Current value of a property.
pub fn get(name: &str) -> Option<String> {
    PROPERTIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Set a property, returning the previous value.
pub fn set(name: impl Into<String>, value: impl Into<String>) -> Option<String> {
    PROPERTIES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.into(), value.into())
}

/// Remove a property, returning its value.
pub fn remove(name: &str) -> Option<String> {
    PROPERTIES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(name)
}

/// Copy of every property currently set.
pub fn snapshot() -> HashMap<String, String> {
    PROPERTIES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub(crate) fn extend<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> usize {
    let mut guard = PROPERTIES.write().unwrap_or_else(PoisonError::into_inner);
    let mut count = 0;
    for (name, value) in pairs {
        guard.insert(name.to_string(), value.to_string());
        count += 1;
    }
    count
}
