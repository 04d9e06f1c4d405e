// SPDX-License-Identifier: MPL-2.0

//! Persisted preferences for the Anadrome live wallpaper.
//!
//! Preferences are read through the [`PreferenceStore`] trait so the engine
//! can run against cosmic-config on a desktop session or against the
//! in-memory [`MemoryStore`] in tests and scenario replays.

pub mod playback;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use cosmic_config::{ConfigGet, ConfigSet};
use serde::{Deserialize, Serialize};

pub use playback::Preferences;

pub const NAME: &str = "io.github.Anadrome";

/// Opaque reference to a video, usually a `file://` URI or a plain path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoRef(String);

impl VideoRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VideoRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("cosmic-config: {0}")]
    Cosmic(#[from] cosmic_config::Error),

    #[error("preference store lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for PreferenceError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// Durable key/value store holding the wallpaper preferences.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str, default: bool) -> bool;

    fn get_string(&self, key: &str) -> Option<String>;

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError>;

    fn set_string(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// cosmic-config backed preference context.
#[derive(Debug, Clone)]
pub struct Context(pub cosmic_config::Config);

/// Open the preference context for the current user.
pub fn context() -> Result<Context, cosmic_config::Error> {
    cosmic_config::Config::new(NAME, 1).map(Context)
}

impl PreferenceStore for Context {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.0.get::<bool>(key).unwrap_or(default)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.0
            .get::<Option<String>>(key)
            .ok()
            .flatten()
            .filter(|value| !value.is_empty())
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.0.set(key, value)?;
        Ok(())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.0.set(key, Some(value.to_owned()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    String(String),
}

/// Process-local preference store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a preference snapshot.
    pub fn with_preferences(preferences: &Preferences) -> Self {
        let store = Self::new();
        // A fresh store cannot be poisoned.
        let _ = preferences.save(&store);
        store
    }
}

impl PreferenceStore for MemoryStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.entries.lock() {
            Ok(entries) => match entries.get(key) {
                Some(Value::Bool(value)) => *value,
                Some(Value::String(_)) => {
                    tracing::warn!(key, "preference holds a string, expected bool");
                    default
                }
                None => default,
            },
            Err(_) => default,
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        match entries.get(key)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            _ => None,
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.entries
            .lock()?
            .insert(key.to_owned(), Value::Bool(value));
        Ok(())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.entries
            .lock()?
            .insert(key.to_owned(), Value::String(value.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();

        other.set_bool("flag", true).unwrap();
        assert!(store.get_bool("flag", false));

        other.set_string("name", "value").unwrap();
        assert_eq!(store.get_string("name").as_deref(), Some("value"));
    }

    #[test]
    fn memory_store_falls_back_on_type_mismatch() {
        let store = MemoryStore::new();
        store.set_string("flag", "yes").unwrap();
        assert!(store.get_bool("flag", true));
        assert!(!store.get_bool("flag", false));
    }

    #[test]
    fn empty_string_reads_as_absent() {
        let store = MemoryStore::new();
        store.set_string("name", "").unwrap();
        assert_eq!(store.get_string("name"), None);
    }

    #[test]
    fn video_ref_displays_reference() {
        let video = VideoRef::new("file:///videos/clip.mp4");
        assert_eq!(video.to_string(), "file:///videos/clip.mp4");
        assert_eq!(VideoRef::from("a"), VideoRef::new(String::from("a")));
    }
}
