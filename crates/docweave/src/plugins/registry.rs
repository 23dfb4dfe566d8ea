//! Shared registry machinery.
//!
//! A [`Registry`] maps unique keys to plugin trait objects in registration order. Every
//! capability registry (extractors, OCR backends, post-processors, validators) wraps one.
//! Writers take a single write lock; readers clone `Arc`s out under the read lock so no lock
//! is held while a plugin runs.

use crate::plugins::Plugin;
use crate::{DocweaveError, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Validate a plugin name: non-empty, no whitespace.
pub(crate) fn validate_plugin_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(DocweaveError::validation("Plugin name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(DocweaveError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(name.to_string())
}

pub(crate) type KeyValidator = fn(&str) -> Result<String>;

pub struct Registry<T: ?Sized + Plugin> {
    kind: &'static str,
    validate_key: KeyValidator,
    entries: RwLock<IndexMap<String, Arc<T>>>,
}

impl<T: ?Sized + Plugin> Registry<T> {
    pub(crate) fn new(kind: &'static str, validate_key: KeyValidator) -> Self {
        Self {
            kind,
            validate_key,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Register `plugin` under `key`.
    ///
    /// Fails with a validation error if the key is invalid or already registered; the
    /// existing entry is left untouched.
    pub fn add(&self, key: &str, plugin: Arc<T>) -> Result<()> {
        let key = (self.validate_key)(key)?;
        let mut entries = self.entries.write();

        if entries.contains_key(&key) {
            return Err(self.duplicate_error(&key));
        }

        initialize(&key, plugin.as_ref())?;
        tracing::debug!(kind = self.kind, key = %key, plugin = plugin.name(), "registered plugin");
        entries.insert(key, plugin);
        Ok(())
    }

    /// Register several plugins atomically: either all are added or none is.
    pub fn add_many(&self, plugins: Vec<(String, Arc<T>)>) -> Result<()> {
        let mut validated = Vec::with_capacity(plugins.len());
        for (key, plugin) in plugins {
            validated.push(((self.validate_key)(&key)?, plugin));
        }

        let mut entries = self.entries.write();
        for (idx, (key, _)) in validated.iter().enumerate() {
            if entries.contains_key(key) || validated[..idx].iter().any(|(other, _)| other == key) {
                return Err(self.duplicate_error(key));
            }
        }

        for (idx, (key, plugin)) in validated.iter().enumerate() {
            if let Err(e) = initialize(key, plugin.as_ref()) {
                for (done_key, done) in &validated[..idx] {
                    shutdown(done_key, done.as_ref());
                }
                return Err(e);
            }
        }

        for (key, plugin) in validated {
            tracing::debug!(kind = self.kind, key = %key, "registered plugin");
            entries.insert(key, plugin);
        }
        Ok(())
    }

    /// Remove the plugin registered under `key`. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let key = normalize_lookup(self.validate_key, key);
        let removed = self.entries.write().shift_remove(&key);
        if let Some(plugin) = removed {
            tracing::debug!(kind = self.kind, key = %key, "unregistered plugin");
            plugin.shutdown().map_err(|e| shutdown_error(&key, e))?;
        }
        Ok(())
    }

    /// Remove `key` only if it still maps to exactly `plugin`.
    pub(crate) fn remove_if_same(&self, key: &str, plugin: &Arc<T>) -> bool {
        let mut entries = self.entries.write();
        let same = entries.get(key).is_some_and(|current| Arc::ptr_eq(current, plugin));
        if same {
            entries.shift_remove(key);
            drop(entries);
            shutdown(key, plugin.as_ref());
        }
        same
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let key = normalize_lookup(self.validate_key, key);
        self.entries.read().get(&key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        let key = normalize_lookup(self.validate_key, key);
        self.entries.read().contains_key(&key)
    }

    /// Keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Entries in registration order.
    pub fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        self.entries
            .read()
            .iter()
            .map(|(key, plugin)| (key.clone(), Arc::clone(plugin)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every plugin, shutting each one down.
    ///
    /// All plugins are removed even if some fail to shut down; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let drained: Vec<(String, Arc<T>)> = self.entries.write().drain(..).collect();
        let mut first_error = None;
        for (key, plugin) in drained {
            if let Err(e) = plugin.shutdown()
                && first_error.is_none()
            {
                first_error = Some(shutdown_error(&key, e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn duplicate_error(&self, key: &str) -> DocweaveError {
        DocweaveError::validation(format!("{} '{}' is already registered", self.kind, key))
    }
}

fn normalize_lookup(validate_key: KeyValidator, key: &str) -> String {
    validate_key(key).unwrap_or_else(|_| key.to_string())
}

fn initialize<T: ?Sized + Plugin>(key: &str, plugin: &T) -> Result<()> {
    plugin.initialize().map_err(|e| DocweaveError::Plugin {
        message: format!("Failed to initialize plugin registered as '{}': {}", key, e),
        plugin_name: plugin.name().to_string(),
        panic: None,
    })
}

fn shutdown<T: ?Sized + Plugin>(key: &str, plugin: &T) {
    if let Err(e) = plugin.shutdown() {
        tracing::warn!(key = %key, plugin = plugin.name(), error = %e, "plugin shutdown failed");
    }
}

fn shutdown_error(key: &str, err: DocweaveError) -> DocweaveError {
    DocweaveError::plugin(key, format!("Failed to shut down plugin: {}", err))
}

/// Registrations that are undone when the guard drops.
///
/// Only the exact plugin instances added through the guard are removed. An entry that was
/// replaced after the guard registered it is left alone.
#[must_use = "registrations are removed as soon as the guard is dropped"]
pub struct ScopedRegistration<'a, T: ?Sized + Plugin> {
    registry: &'a Registry<T>,
    added: Vec<(String, Arc<T>)>,
}

impl<'a, T: ?Sized + Plugin> ScopedRegistration<'a, T> {
    pub(crate) fn new(registry: &'a Registry<T>, plugins: Vec<(String, Arc<T>)>) -> Result<Self> {
        let mut added = Vec::with_capacity(plugins.len());
        for (key, plugin) in plugins {
            added.push(((registry.validate_key)(&key)?, plugin));
        }
        registry.add_many(added.clone())?;
        Ok(Self { registry, added })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.added.iter().map(|(key, _)| key.as_str())
    }
}

impl<T: ?Sized + Plugin> Drop for ScopedRegistration<'_, T> {
    fn drop(&mut self) {
        for (key, plugin) in self.added.drain(..) {
            if !self.registry.remove_if_same(&key, &plugin) {
                tracing::debug!(key = %key, "scoped plugin was already removed or replaced");
            }
        }
    }
}
