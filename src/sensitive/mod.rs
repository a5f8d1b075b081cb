// src/sensitive/mod.rs

//! Sensitive value guard
//!
//! The [`Redactor`] is the one place that knows which strings are secret.
//! The variable store registers every value written under a sensitive name,
//! and the deployment log passes every message through [`Redactor::mask`]
//! before it reaches a sink. Logging code never inspects variable
//! sensitivity itself.
//!
//! Secrets that must reach a child process through a generated file are
//! encrypted with a per-run [`VariableEncryptor`]; see [`encryption`].

pub mod encryption;

pub use encryption::{EncryptedValue, VariableEncryptor};

use std::borrow::Cow;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Token written in place of any sensitive value
pub const MASK: &str = "********";

/// Shared, clonable registry of sensitive values
///
/// Clones share the same registry, so a value registered through the
/// variable store is immediately masked by every log holding a clone.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    values: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    /// Create an empty redactor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value that must never be written in plaintext
    ///
    /// Empty values are ignored; masking them would mangle every message.
    pub fn register(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut values = self.write();
        if values.iter().any(|v| v == value) {
            return;
        }
        values.push(value.to_string());
        // Longest first, so a secret containing another secret is masked whole
        values.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    /// Whether `value` is a registered sensitive value
    pub fn is_registered(&self, value: &str) -> bool {
        self.read().iter().any(|v| v == value)
    }

    /// Number of registered values
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace every occurrence of every registered value with [`MASK`]
    pub fn mask<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let values = self.read();
        if !values.iter().any(|v| text.contains(v.as_str())) {
            return Cow::Borrowed(text);
        }

        let mut masked = text.to_string();
        for value in values.iter() {
            if masked.contains(value.as_str()) {
                masked = masked.replace(value.as_str(), MASK);
            }
        }
        Cow::Owned(masked)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.values.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.values.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
