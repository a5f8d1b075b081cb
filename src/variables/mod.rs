// src/variables/mod.rs

//! Variable store threaded through every deployment step
//!
//! The store is an insertion-ordered map from name to raw value with a
//! per-name sensitivity flag. Names compare case-insensitively; the
//! spelling of the first write is kept for enumeration and output.
//!
//! # Sensitivity
//!
//! Sensitivity is sticky. Once a name is sensitive, plain [`VariableStore::set`]
//! keeps it sensitive and the new value is registered with the shared
//! [`Redactor`]. Only [`VariableStore::set_with_sensitivity`], which states the
//! flag explicitly, can clear it.
//!
//! # Evaluation
//!
//! Raw values may contain `#{Name}` references. [`VariableStore::get_evaluated`]
//! expands them through the injected [`ExpressionEvaluator`]; evaluated
//! values are never stored.

mod evaluator;
pub mod io;
pub mod names;

pub use evaluator::{ExpressionEvaluator, SubstitutionEvaluator};
pub use io::{OutputDocument, OutputVariable};

use crate::error::{Error, Result};
use crate::sensitive::Redactor;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A single named variable
#[derive(Clone, PartialEq, Eq)]
pub struct Variable {
    /// Name as first written
    pub name: String,
    /// Raw, unevaluated value; `None` is distinct from empty
    pub value: Option<String>,
    /// Whether the value must be redacted
    pub sensitive: bool,
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.sensitive {
            self.value.as_ref().map(|_| crate::sensitive::MASK)
        } else {
            self.value.as_deref()
        };
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("value", &value)
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

/// Ordered, case-insensitive variable store
#[derive(Clone)]
pub struct VariableStore {
    entries: IndexMap<String, Variable>,
    redactor: Redactor,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("variables", &self.entries.values().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl VariableStore {
    /// Create an empty store with its own redactor and the default evaluator
    pub fn new() -> Self {
        Self::with_redactor(Redactor::new())
    }

    /// Create an empty store registering secrets with `redactor`
    pub fn with_redactor(redactor: Redactor) -> Self {
        Self {
            entries: IndexMap::new(),
            redactor,
            evaluator: Arc::new(SubstitutionEvaluator::default()),
        }
    }

    /// Replace the expression evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// The redactor secrets are registered with
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Set a value, keeping any existing sensitivity
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.put(name, Some(value.into()), None);
    }

    /// Set a value and mark it sensitive
    pub fn set_sensitive(&mut self, name: &str, value: impl Into<String>) {
        self.put(name, Some(value.into()), Some(true));
    }

    /// Set a value with an explicitly specified sensitivity
    ///
    /// This is the only write that can clear sensitivity.
    pub fn set_with_sensitivity(&mut self, name: &str, value: impl Into<String>, sensitive: bool) {
        self.put(name, Some(value.into()), Some(sensitive));
    }

    /// Set a raw value that may be absent
    pub fn set_raw(&mut self, name: &str, value: Option<String>, sensitive: Option<bool>) {
        self.put(name, value, sensitive);
    }

    fn put(&mut self, name: &str, value: Option<String>, sensitive: Option<bool>) {
        let key = normalize(name);
        let entry = self.entries.entry(key).or_insert_with(|| Variable {
            name: name.to_string(),
            value: None,
            sensitive: false,
        });

        if let Some(flag) = sensitive {
            entry.sensitive = flag;
        }
        entry.value = value;

        if entry.sensitive
            && let Some(value) = &entry.value
        {
            self.redactor.register(value);
        }
    }

    /// Raw value, or `None` if the name is unknown or has no value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&normalize(name)).and_then(|v| v.value.as_deref())
    }

    /// Raw value or a default
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Value after expression evaluation
    pub fn get_evaluated(&self, name: &str) -> Option<String> {
        self.get(name).map(|raw| self.evaluator.evaluate(raw, self))
    }

    /// Evaluate arbitrary text against this store
    pub fn evaluate(&self, text: &str) -> String {
        self.evaluator.evaluate(text, self)
    }

    /// Evaluated value that must be present and non-empty
    pub fn require(&self, name: &str) -> Result<String> {
        match self.get_evaluated(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::MissingVariable(name.to_string())),
        }
    }

    /// Boolean flag; unparsable or absent values yield `default`
    pub fn get_flag(&self, name: &str, default: bool) -> bool {
        match self.get_evaluated(name) {
            Some(text) => parse_bool(&text).unwrap_or(default),
            None => default,
        }
    }

    /// Integer value; `None` when absent or unparsable
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get_evaluated(name).and_then(|text| text.trim().parse().ok())
    }

    /// Evaluated value split on `separator`, trimmed, empties dropped
    pub fn get_strings(&self, name: &str, separator: char) -> Vec<String> {
        self.get_evaluated(name)
            .map(|value| {
                value
                    .split(separator)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Newline-separated list (paths, globs)
    pub fn get_paths(&self, name: &str) -> Vec<String> {
        self.get_evaluated(name)
            .map(|value| {
                value
                    .lines()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the name is marked sensitive
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.entries.get(&normalize(name)).is_some_and(|v| v.sensitive)
    }

    /// Whether the name exists (even with no value)
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    /// Names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.values().map(|v| v.name.as_str())
    }

    /// Variables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.entries.values()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Parse "true"/"false" in any case
pub fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
