// src/scripting/bootstrap.rs

//! Per-interpreter bootstrap generation
//!
//! Every bootstrapper honours the same contract: all variables are embedded
//! in a generated configuration file, sensitive values only as ciphertext
//! plus IV under the per-run key, and the key itself is passed to the
//! interpreter as a command-line argument. Generated files are returned as
//! [`TemporaryFile`] guards so they are removed however the run ends.

use super::{Script, ScriptSyntax};
use crate::error::Result;
use crate::fs::{FileSystem, TemporaryFile};
use crate::process::CommandInvocation;
use crate::sensitive::{EncryptedValue, VariableEncryptor};
use crate::variables::VariableStore;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const BASH_CONFIGURE_TEMPLATE: &str = include_str!("templates/configure.sh");
const PYTHON_CONFIGURE_TEMPLATE: &str = include_str!("templates/configure.py");
const POWERSHELL_CONFIGURE_TEMPLATE: &str = include_str!("templates/configure.ps1");

/// A command ready to run plus the files generated for it
#[derive(Debug)]
pub struct PreparedScript {
    pub invocation: CommandInvocation,
    /// Deleted when dropped
    pub temporary_files: Vec<TemporaryFile>,
}

/// Writes the configuration and bootstrap files for one syntax
pub trait ScriptBootstrapper: Send + Sync {
    /// Syntax this bootstrapper handles
    fn syntax(&self) -> ScriptSyntax;

    /// Generate files and build the interpreter command
    fn prepare(
        &self,
        script: &Script,
        variables: &VariableStore,
        encryptor: &VariableEncryptor,
        fs: &Arc<dyn FileSystem>,
    ) -> Result<PreparedScript>;
}

/// How one value is embedded in a configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddedValue {
    /// Base64 of the UTF-8 value
    Plain(String),
    /// Encrypted under the per-run key
    Encrypted(EncryptedValue),
}

/// A variable ready for embedding: base64 of the lowercased name plus value
struct EmbeddedVariable {
    encoded_name: String,
    value: EmbeddedValue,
}

fn encode(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

fn embed_variables(variables: &VariableStore, encryptor: &VariableEncryptor) -> Result<Vec<EmbeddedVariable>> {
    variables
        .iter()
        .map(|variable| {
            let raw = variable.value.as_deref().unwrap_or("");
            let value = if variable.sensitive {
                EmbeddedValue::Encrypted(encryptor.encrypt(raw)?)
            } else {
                EmbeddedValue::Plain(encode(raw))
            };
            Ok(EmbeddedVariable {
                encoded_name: encode(&variable.name.to_lowercase()),
                value,
            })
        })
        .collect()
}

/// Short unique infix for generated file names
fn unique_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}

/// Normalize line endings so interpreters on Unix read the file
fn unix_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn generated_file(
    fs: &Arc<dyn FileSystem>,
    directory: &Path,
    name: String,
    contents: &str,
) -> Result<TemporaryFile> {
    TemporaryFile::create(Arc::clone(fs), directory.join(name), contents.as_bytes())
}

/// Bash: `bash Bootstrap.<id>.<script> <key>`
#[derive(Debug, Clone)]
pub struct BashBootstrapper {
    executable: String,
}

impl BashBootstrapper {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn configuration(&self, embedded: &[EmbeddedVariable]) -> String {
        let cases: Vec<String> = embedded
            .iter()
            .map(|v| {
                let value = match &v.value {
                    EmbeddedValue::Plain(b64) => format!("decode_value \"{}\"", b64),
                    EmbeddedValue::Encrypted(enc) => {
                        format!("decrypt_variable \"{}\" \"{}\"", enc.ciphertext_base64(), enc.iv_hex())
                    }
                };
                format!("    \"{}\")\n        {}\n        ;;", v.encoded_name, value)
            })
            .collect();
        BASH_CONFIGURE_TEMPLATE.replace("#### VariableDeclarations ####", &cases.join("\n"))
    }
}

impl Default for BashBootstrapper {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl ScriptBootstrapper for BashBootstrapper {
    fn syntax(&self) -> ScriptSyntax {
        ScriptSyntax::Bash
    }

    fn prepare(
        &self,
        script: &Script,
        variables: &VariableStore,
        encryptor: &VariableEncryptor,
        fs: &Arc<dyn FileSystem>,
    ) -> Result<PreparedScript> {
        let directory = script.directory();
        let id = unique_id();
        let embedded = embed_variables(variables, encryptor)?;

        let configure_name = format!("Configure.{}.sh", id);
        let configure = generated_file(fs, &directory, configure_name.clone(), &self.configuration(&embedded))?;

        let mut bootstrap = String::from("#!/bin/bash\n");
        bootstrap.push_str(&format!("source \"$(pwd)/{}\"\n", configure_name));
        // Take the key out of the positional parameters the script sees
        bootstrap.push_str("shift\n");
        bootstrap.push_str(&format!("source \"$(pwd)/{}\"", script.file_name()));
        if let Some(parameters) = &script.parameters {
            bootstrap.push(' ');
            bootstrap.push_str(parameters);
        }
        bootstrap.push('\n');

        let bootstrap_name = format!("Bootstrap.{}.{}", id, script.file_name());
        let bootstrap_file = generated_file(fs, &directory, bootstrap_name.clone(), &bootstrap)?;

        let body = fs.read_text(&script.path)?;
        if body.contains("\r\n") {
            fs.write_text(&script.path, &unix_line_endings(&body))?;
        }

        let invocation = CommandInvocation::new(&self.executable, &directory)
            .arg(bootstrap_name)
            .arg(encryptor.key_hex());

        Ok(PreparedScript {
            invocation,
            temporary_files: vec![bootstrap_file, configure],
        })
    }
}

/// Python: `python3 Bootstrap.<id>.<script> <key> <params...>`
#[derive(Debug, Clone)]
pub struct PythonBootstrapper {
    executable: String,
}

impl PythonBootstrapper {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn configuration(&self, embedded: &[EmbeddedVariable]) -> String {
        let entries: Vec<String> = embedded
            .iter()
            .map(|v| {
                let value = match &v.value {
                    EmbeddedValue::Plain(b64) => format!("decode(\"{}\")", b64),
                    EmbeddedValue::Encrypted(enc) => {
                        format!("decrypt(\"{}\", \"{}\")", enc.ciphertext_base64(), enc.iv_hex())
                    }
                };
                format!("    decode(\"{}\"): {},", v.encoded_name, value)
            })
            .collect();
        let declarations = format!("octopusvariables = {{\n{}\n}}", entries.join("\n"));
        PYTHON_CONFIGURE_TEMPLATE.replace("{{VariableDeclarations}}", &declarations)
    }
}

impl Default for PythonBootstrapper {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl ScriptBootstrapper for PythonBootstrapper {
    fn syntax(&self) -> ScriptSyntax {
        ScriptSyntax::Python
    }

    fn prepare(
        &self,
        script: &Script,
        variables: &VariableStore,
        encryptor: &VariableEncryptor,
        fs: &Arc<dyn FileSystem>,
    ) -> Result<PreparedScript> {
        let directory = script.directory();
        let id = unique_id();
        let embedded = embed_variables(variables, encryptor)?;

        let configure_name = format!("Configure.{}.py", id);
        let configure = generated_file(fs, &directory, configure_name.clone(), &self.configuration(&embedded))?;

        let script_name = script.file_name();
        let bootstrap = format!(
            "import sys\n\
             from runpy import run_path\n\
             sensitive_key = sys.argv.pop(1)\n\
             configuration = run_path(\"{configure}\", init_globals={{\"sensitive_key\": sensitive_key}})\n\
             sys.argv[0] = \"{script}\"\n\
             run_path(\"{script}\", init_globals=configuration, run_name=\"__main__\")\n",
            configure = configure_name,
            script = script_name,
        );
        let bootstrap_name = format!("Bootstrap.{}.{}", id, script_name);
        let bootstrap_file = generated_file(fs, &directory, bootstrap_name.clone(), &bootstrap)?;

        let invocation = CommandInvocation::new(&self.executable, &directory)
            .arg(bootstrap_name)
            .arg(encryptor.key_hex())
            .args(script.parameter_args());

        Ok(PreparedScript {
            invocation,
            temporary_files: vec![bootstrap_file, configure],
        })
    }
}

/// PowerShell: `pwsh -File Bootstrap.<id>.<script> <key> <params...>`
#[derive(Debug, Clone)]
pub struct PowerShellBootstrapper {
    executable: String,
}

impl PowerShellBootstrapper {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn configuration(&self, embedded: &[EmbeddedVariable]) -> String {
        let entries: Vec<String> = embedded
            .iter()
            .map(|v| {
                let value = match &v.value {
                    EmbeddedValue::Plain(b64) => format!("(Decode-OctopusValue \"{}\")", b64),
                    EmbeddedValue::Encrypted(enc) => format!(
                        "(Decrypt-OctopusValue \"{}\" \"{}\")",
                        enc.ciphertext_base64(),
                        enc.iv_hex()
                    ),
                };
                format!("$OctopusParameters[(Decode-OctopusValue \"{}\")] = {}", v.encoded_name, value)
            })
            .collect();
        POWERSHELL_CONFIGURE_TEMPLATE.replace("{{VariableDeclarations}}", &entries.join("\n"))
    }
}

impl Default for PowerShellBootstrapper {
    fn default() -> Self {
        Self::new("pwsh")
    }
}

impl ScriptBootstrapper for PowerShellBootstrapper {
    fn syntax(&self) -> ScriptSyntax {
        ScriptSyntax::PowerShell
    }

    fn prepare(
        &self,
        script: &Script,
        variables: &VariableStore,
        encryptor: &VariableEncryptor,
        fs: &Arc<dyn FileSystem>,
    ) -> Result<PreparedScript> {
        let directory = script.directory();
        let id = unique_id();
        let embedded = embed_variables(variables, encryptor)?;

        let configure_name = format!("Configure.{}.ps1", id);
        let configure = generated_file(fs, &directory, configure_name.clone(), &self.configuration(&embedded))?;

        let bootstrap = format!(
            "$OctopusKey = $args[0]\n\
             . \"$PSScriptRoot/{configure}\"\n\
             $scriptArgs = @($args | Select-Object -Skip 1)\n\
             & \"$PSScriptRoot/{script}\" @scriptArgs\n\
             exit $LASTEXITCODE\n",
            configure = configure_name,
            script = script.file_name(),
        );
        let bootstrap_name = format!("Bootstrap.{}.{}", id, script.file_name());
        let bootstrap_file = generated_file(fs, &directory, bootstrap_name.clone(), &bootstrap)?;

        let invocation = CommandInvocation::new(&self.executable, &directory)
            .args(["-NoLogo", "-NonInteractive", "-NoProfile", "-ExecutionPolicy", "Unrestricted", "-File"])
            .arg(bootstrap_name)
            .arg(encryptor.key_hex())
            .args(script.parameter_args());

        Ok(PreparedScript {
            invocation,
            temporary_files: vec![bootstrap_file, configure],
        })
    }
}
