// src/variables/io.rs

//! Loading variables from invoker input and writing them back out
//!
//! Input is a plain JSON object of name to value, optionally followed by
//! sensitive variables files (which may be password-encrypted) and the
//! agent's own environment. Output is a machine-readable document carrying
//! every variable with its exact value and sensitivity.

use super::{VariableStore, names};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::sensitive::{MASK, VariableEncryptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Parse a variables JSON object, preserving file order
fn parse_variables(text: &str, source: &str) -> Result<IndexMap<String, Option<String>>> {
    let raw: IndexMap<String, Value> = serde_json::from_str(text)
        .map_err(|e| Error::VariablesFile(format!("Unable to parse {} as valid JSON: {}", source, e)))?;

    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            };
            (name, value)
        })
        .collect())
}

/// Merge a plain variables file into the store
///
/// Returns the number of variables read.
pub fn load_variables_file(fs: &dyn FileSystem, path: &Path, store: &mut VariableStore) -> Result<usize> {
    if !fs.exists(path) {
        return Err(Error::VariablesFile(format!(
            "Could not find variables file: {}",
            path.display()
        )));
    }

    let text = fs.read_text(path)?;
    let variables = parse_variables(&text, &path.display().to_string())?;
    let count = variables.len();
    for (name, value) in variables {
        store.set_raw(&name, value, None);
    }

    debug!("Loaded {} variables from {}", count, path.display());
    Ok(count)
}

/// Merge a sensitive variables file into the store, marking every entry sensitive
///
/// With a password the file is expected in the encrypted form produced by
/// [`VariableEncryptor::encrypt_file_contents`].
pub fn load_sensitive_variables_file(
    fs: &dyn FileSystem,
    path: &Path,
    password: Option<&str>,
    store: &mut VariableStore,
) -> Result<usize> {
    if !fs.exists(path) {
        return Err(Error::VariablesFile(format!(
            "Could not find sensitive variables file: {}",
            path.display()
        )));
    }

    let text = match password.filter(|p| !p.trim().is_empty()) {
        Some(password) => {
            let sealed = fs.read_bytes(path)?;
            let opened = VariableEncryptor::from_password(password)
                .decrypt_file_contents(&sealed)
                .map_err(|_| {
                    Error::VariablesFile(
                        "Cannot decrypt sensitive-variables. Check your password is correct.".to_string(),
                    )
                })?;
            String::from_utf8(opened).map_err(|_| {
                Error::VariablesFile(
                    "Cannot decrypt sensitive-variables. Check your password is correct.".to_string(),
                )
            })?
        }
        None => fs.read_text(path)?,
    };

    let variables = parse_variables(&text, "sensitive-variables")?;
    let count = variables.len();
    for (name, value) in variables {
        store.set_raw(&name, value, Some(true));
    }

    debug!("Loaded {} sensitive variables from {}", count, path.display());
    Ok(count)
}

/// Import environment variables as `env:<NAME>`
pub fn import_environment<I, K, V>(store: &mut VariableStore, vars: I) -> usize
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut count = 0;
    for (name, value) in vars {
        store.set(&format!("{}{}", names::ENVIRONMENT_PREFIX, name.as_ref()), value);
        count += 1;
    }
    count
}

/// Merge the file named by `AdditionalVariablesPath`, if any
///
/// The name is looked up as a variable first and then as an imported
/// environment variable.
pub fn load_additional_variables(fs: &dyn FileSystem, store: &mut VariableStore) -> Result<usize> {
    let path = store
        .get(names::ADDITIONAL_VARIABLES_PATH)
        .or_else(|| store.get(&format!("{}{}", names::ENVIRONMENT_PREFIX, names::ADDITIONAL_VARIABLES_PATH)))
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let Some(path) = path else {
        return Ok(0);
    };

    load_variables_file(fs, Path::new(&path), store).map_err(|e| {
        Error::VariablesFile(format!(
            "Could not read additional variables from JSON file at '{}'. {} Make sure the file can be \
             read or remove the '{}' environment variable.",
            path,
            e,
            names::ADDITIONAL_VARIABLES_PATH
        ))
    })
}

/// One variable in the output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVariable {
    pub name: String,
    pub value: Option<String>,
    pub sensitive: bool,
}

/// Machine-readable final state of the store
///
/// Values are exact, including sensitive ones; the consumer is the invoking
/// process, not a human.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub variables: Vec<OutputVariable>,
}

impl OutputDocument {
    /// Snapshot the store in insertion order
    pub fn from_store(store: &VariableStore) -> Self {
        Self {
            variables: store
                .iter()
                .map(|v| OutputVariable {
                    name: v.name.clone(),
                    value: v.value.clone(),
                    sensitive: v.sensitive,
                })
                .collect(),
        }
    }

    /// Rebuild a store from a document
    pub fn into_store(self) -> VariableStore {
        let mut store = VariableStore::new();
        for variable in self.variables {
            store.set_raw(&variable.name, variable.value, Some(variable.sensitive));
        }
        store
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the document to `path`
    pub fn write(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        fs.write_text(path, &self.to_json()?)
    }
}

/// `name = value` lines for a human log, sensitive values masked
pub fn describe_for_humans(store: &VariableStore) -> Vec<String> {
    store
        .iter()
        .map(|v| {
            let value = match (&v.value, v.sensitive) {
                (None, _) => "<null>",
                (Some(_), true) => MASK,
                (Some(value), false) => value.as_str(),
            };
            format!("{} = {}", v.name, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::PhysicalFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_load_plain_file_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("variables.json");
        std::fs::write(&path, r#"{"Zeta":"1","Alpha":null,"Count":3}"#).unwrap();

        let mut store = VariableStore::new();
        let count = load_variables_file(&PhysicalFileSystem, &path, &mut store).unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Count"]);
        assert_eq!(store.get("Alpha"), None);
        assert!(store.contains("Alpha"));
        assert_eq!(store.get("Count"), Some("3"));
        assert!(!store.is_sensitive("Zeta"));
    }

    #[test]
    fn test_missing_and_invalid_files_are_known_failures() {
        let dir = TempDir::new().unwrap();
        let mut store = VariableStore::new();

        let err = load_variables_file(&PhysicalFileSystem, &dir.path().join("nope.json"), &mut store)
            .unwrap_err();
        assert!(err.is_known());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        let err = load_variables_file(&PhysicalFileSystem, &bad, &mut store).unwrap_err();
        assert!(matches!(err, Error::VariablesFile(_)));
    }

    #[test]
    fn test_sensitive_file_with_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sensitive.json");
        let sealed = VariableEncryptor::from_password("pw")
            .encrypt_file_contents(br#"{"DbPassword":"hunter2"}"#)
            .unwrap();
        std::fs::write(&path, sealed).unwrap();

        let mut store = VariableStore::new();
        load_sensitive_variables_file(&PhysicalFileSystem, &path, Some("pw"), &mut store).unwrap();
        assert_eq!(store.get("DbPassword"), Some("hunter2"));
        assert!(store.is_sensitive("DbPassword"));
        assert!(store.redactor().is_registered("hunter2"));

        let err = load_sensitive_variables_file(&PhysicalFileSystem, &path, Some("wrong"), &mut store)
            .unwrap_err();
        assert!(err.to_string().contains("Check your password"));
    }

    #[test]
    fn test_sensitive_file_plain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sensitive.json");
        std::fs::write(&path, r#"{"ApiKey":"abc123"}"#).unwrap();

        let mut store = VariableStore::new();
        load_sensitive_variables_file(&PhysicalFileSystem, &path, None, &mut store).unwrap();
        assert!(store.is_sensitive("apikey"));
    }

    #[test]
    fn test_import_environment() {
        let mut store = VariableStore::new();
        let count = import_environment(&mut store, vec![("HOME", "/root"), ("PATH", "/bin")]);
        assert_eq!(count, 2);
        assert_eq!(store.get("env:HOME"), Some("/root"));
    }

    #[test]
    fn test_additional_variables_from_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extra.json");
        std::fs::write(&path, r#"{"Extra":"yes"}"#).unwrap();

        let mut store = VariableStore::new();
        import_environment(&mut store, vec![("AdditionalVariablesPath", path.display().to_string())]);
        assert_eq!(load_additional_variables(&PhysicalFileSystem, &mut store).unwrap(), 1);
        assert_eq!(store.get("Extra"), Some("yes"));

        let mut empty = VariableStore::new();
        assert_eq!(load_additional_variables(&PhysicalFileSystem, &mut empty).unwrap(), 0);
    }

    #[test]
    fn test_output_document_exact_and_human_masked() {
        let mut store = VariableStore::new();
        store.set("Greeting", "Hello");
        store.set_sensitive("Password", "hunter2");

        let doc = OutputDocument::from_store(&store);
        let json = doc.to_json().unwrap();
        assert!(json.contains("hunter2"));

        let restored = OutputDocument::from_json(&json).unwrap().into_store();
        assert!(restored.is_sensitive("Password"));
        assert_eq!(restored.get("Greeting"), Some("Hello"));

        let lines = describe_for_humans(&store);
        assert_eq!(lines, vec!["Greeting = Hello".to_string(), format!("Password = {}", MASK)]);
    }
}
