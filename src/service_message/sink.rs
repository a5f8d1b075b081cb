// src/service_message/sink.rs

//! Applying service messages to a running deployment
//!
//! The sink sits between a child process and the deployment log. Every
//! stdout line is run through the decoder, each decoded message takes
//! effect, and then the whole original line is forwarded to the log
//! unchanged (apart from masking). Effects happen in emission order, so a
//! variable set by one line is visible before the next line is handled.

use super::names::{self, MessageKind, StreamTarget, attr};
use super::{ServiceMessage, ServiceMessageDecoder};
use crate::log::{DeploymentLog, LogLevel};
use crate::process::OutputHandler;
use crate::variables::{VariableStore, parse_bool};
use tracing::debug;

/// Package metadata a script reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPackage {
    pub id: String,
    pub version: String,
    pub version_format: Option<String>,
    pub hash: Option<String>,
    pub remote_path: Option<String>,
    pub file_extension: Option<String>,
}

/// Result of verifying a delta-compressed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaVerification {
    pub remote_path: String,
    pub hash: String,
    pub size: u64,
}

/// File a script asked to be collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: Option<String>,
    pub length: u64,
}

/// Everything a script reported besides variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutputReport {
    /// Names set through `setVariable`, in order
    pub variables_set: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub found_packages: Vec<FoundPackage>,
    /// A `calamari-found-package` message was seen
    pub package_found: bool,
    pub delta_verification: Option<DeltaVerification>,
    pub delta_verification_error: Option<String>,
    pub result_message: Option<String>,
    /// Last reported progress percentage
    pub progress: Option<i32>,
    /// Account/target creation requests
    pub actions: Vec<ServiceMessage>,
    /// Number of messages decoded
    pub messages: usize,
}

/// Output handler applying service messages to a variable store
pub struct ServiceMessageSink<'a> {
    variables: &'a mut VariableStore,
    log: &'a DeploymentLog,
    decoder: ServiceMessageDecoder,
    stdout: StreamTarget,
    stderr: StreamTarget,
    report: ScriptOutputReport,
}

impl<'a> ServiceMessageSink<'a> {
    pub fn new(variables: &'a mut VariableStore, log: &'a DeploymentLog) -> Self {
        Self {
            variables,
            log,
            decoder: ServiceMessageDecoder::new(),
            stdout: StreamTarget::Log(LogLevel::Info),
            stderr: StreamTarget::Log(LogLevel::Error),
            report: ScriptOutputReport::default(),
        }
    }

    /// Report accumulated so far
    pub fn report(&self) -> &ScriptOutputReport {
        &self.report
    }

    /// Stop consuming output; an incomplete trailing message is dropped
    pub fn finish(mut self) -> ScriptOutputReport {
        self.decoder.reset();
        self.report
    }

    /// Apply a single decoded message
    pub fn apply(&mut self, message: &ServiceMessage) {
        self.report.messages += 1;

        let Some(kind) = message.kind() else {
            debug!("Ignoring unrecognized service message '{}'", message.name());
            return;
        };

        match kind {
            MessageKind::SetVariable => self.set_variable(message),
            MessageKind::Progress => {
                let percentage = message.get(attr::PERCENTAGE).and_then(|p| p.trim().parse::<i32>().ok());
                if let (Some(percentage), Some(text)) = (percentage, message.get(attr::MESSAGE)) {
                    self.report.progress = Some(percentage);
                    self.log.verbose(format!("Progress: {}% {}", percentage, text));
                }
            }
            MessageKind::CreateArtifact => {
                if let Some(name) = message.get(attr::NAME) {
                    let length = message
                        .get(attr::LENGTH)
                        .and_then(|l| l.trim().parse().ok())
                        .unwrap_or(0);
                    let path = message.get(attr::PATH).map(str::to_string);
                    self.log.verbose(format!(
                        "Artifact {} will be collected from {}",
                        name,
                        path.as_deref().unwrap_or("<unknown>")
                    ));
                    self.report.artifacts.push(Artifact {
                        name: name.to_string(),
                        path,
                        length,
                    });
                }
            }
            MessageKind::ResultMessage => {
                self.report.result_message = message.get(attr::MESSAGE).map(str::to_string);
            }
            MessageKind::CalamariFoundPackage => self.report.package_found = true,
            MessageKind::FoundPackage => {
                if let (Some(id), Some(version)) = (message.get(attr::ID), message.get(attr::VERSION)) {
                    self.report.found_packages.push(FoundPackage {
                        id: id.to_string(),
                        version: version.to_string(),
                        version_format: message.get(attr::VERSION_FORMAT).map(str::to_string),
                        hash: message.get(attr::HASH).map(str::to_string),
                        remote_path: message.get(attr::REMOTE_PATH).map(str::to_string),
                        file_extension: message.get(attr::FILE_EXTENSION).map(str::to_string),
                    });
                }
            }
            MessageKind::DeltaVerification => self.delta_verification(message),
            MessageKind::Stdout(target) => self.stdout = target,
            MessageKind::Stderr(target) => self.stderr = target,
            MessageKind::ScriptOutputAction => self.report.actions.push(message.clone()),
        }
    }

    fn set_variable(&mut self, message: &ServiceMessage) {
        let (Some(name), Some(value)) = (message.get(attr::NAME), message.get(attr::VALUE)) else {
            debug!("{} message without name or value", names::SET_VARIABLE);
            return;
        };
        let sensitive = message
            .get(attr::SENSITIVE)
            .and_then(parse_bool)
            .unwrap_or(false);

        if sensitive {
            // Registered before the carrying line is forwarded
            self.log.redactor().register(value);
            self.variables.set_sensitive(name, value);
        } else {
            self.variables.set(name, value);
        }
        self.report.variables_set.push(name.to_string());
    }

    fn delta_verification(&mut self, message: &ServiceMessage) {
        self.report.delta_verification_error = message.get(attr::ERROR).map(str::to_string);

        let remote_path = message.get(attr::REMOTE_PATH);
        let hash = message.get(attr::HASH);
        let size = message.get(attr::SIZE);
        if let (Some(remote_path), Some(hash), Some(size)) = (remote_path, hash, size) {
            match size.trim().parse() {
                Ok(size) => {
                    self.report.delta_verification = Some(DeltaVerification {
                        remote_path: remote_path.to_string(),
                        hash: hash.to_string(),
                        size,
                    });
                }
                Err(_) => debug!("Ignoring delta verification with invalid size '{}'", size),
            }
        }
    }

    fn forward(&self, target: StreamTarget, line: &str) {
        if let StreamTarget::Log(level) = target {
            self.log.log(level, line);
        }
    }
}

impl OutputHandler for ServiceMessageSink<'_> {
    fn on_stdout(&mut self, line: &str) {
        let mut messages = self.decoder.push(line);
        messages.extend(self.decoder.push_char('\n'));
        for message in &messages {
            self.apply(message);
        }
        self.forward(self.stdout, line);
    }

    fn on_stderr(&mut self, line: &str) {
        self.forward(self.stderr, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemorySink;
    use crate::sensitive::{MASK, Redactor};
    use std::sync::Arc;

    fn setup() -> (VariableStore, DeploymentLog, Arc<MemorySink>) {
        let redactor = Redactor::new();
        let sink = Arc::new(MemorySink::new());
        let log = DeploymentLog::new(redactor.clone(), sink.clone());
        (VariableStore::with_redactor(redactor), log, sink)
    }

    #[test]
    fn test_set_variable_and_line_forwarded_verbatim() {
        let (mut vars, log, memory) = setup();
        let line = "##octopus[setVariable name='R3JlZXRpbmc=' value='V29ybGQ=']";
        {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            sink.on_stdout(line);
            let report = sink.finish();
            assert_eq!(report.variables_set, vec!["Greeting"]);
        }
        assert_eq!(vars.get("Greeting"), Some("World"));
        assert_eq!(memory.messages(), vec![line.to_string()]);
    }

    #[test]
    fn test_sensitive_value_masked_on_its_own_line() {
        let (mut vars, log, memory) = setup();
        let message = ServiceMessage::set_variable("Token", "s3cr3t-value", true);
        let line = format!("{} s3cr3t-value", message.encode());
        {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            sink.on_stdout(&line);
            sink.on_stdout("echo s3cr3t-value");
        }
        assert!(vars.is_sensitive("Token"));
        assert!(!memory.contains("s3cr3t-value"));
        assert!(memory.contains(&format!("echo {}", MASK)));
    }

    #[test]
    fn test_stream_routing_messages() {
        let (mut vars, log, memory) = setup();
        {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            sink.on_stdout("##octopus[stdout-warning]");
            sink.on_stdout("careful");
            sink.on_stdout("##octopus[stdout-ignore]");
            sink.on_stdout("hidden");
            sink.on_stdout("##octopus[stdout-default]");
            sink.on_stderr("problem");
            sink.on_stdout("##octopus[stderr-progress]");
            sink.on_stderr("downloading");
        }
        let entries = memory.entries();
        let find = |text: &str| entries.iter().find(|e| e.message == text).map(|e| e.level);
        assert_eq!(find("careful"), Some(LogLevel::Warn));
        assert_eq!(find("hidden"), None);
        assert_eq!(find("problem"), Some(LogLevel::Error));
        assert_eq!(find("downloading"), Some(LogLevel::Verbose));
    }

    #[test]
    fn test_report_collects_metadata() {
        let (mut vars, log, _) = setup();
        let lines = [
            ServiceMessage::new("createArtifact")
                .with_property("path", "/tmp/report.html")
                .with_property("name", "report.html")
                .with_property("length", "42")
                .encode(),
            ServiceMessage::new("foundPackage")
                .with_property("id", "Acme.Web")
                .with_property("version", "1.2.3")
                .with_property("hash", "abc")
                .encode(),
            ServiceMessage::new("calamari-found-package").encode(),
            ServiceMessage::new("deltaVerification")
                .with_property("remotePath", "/pkgs/Acme.Web.1.2.3.tar.gz")
                .with_property("hash", "def")
                .with_property("size", "1024")
                .encode(),
            ServiceMessage::new("resultMessage").with_property("message", "done").encode(),
            ServiceMessage::new("progress")
                .with_property("percentage", "50")
                .with_property("message", "halfway")
                .encode(),
            ServiceMessage::new("create-tokenaccount").with_property("name", "ci").encode(),
            ServiceMessage::new("unknownThing").encode(),
        ];

        let report = {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            for line in &lines {
                sink.on_stdout(line);
            }
            sink.finish()
        };

        assert_eq!(report.messages, lines.len());
        assert_eq!(report.artifacts[0].length, 42);
        assert_eq!(report.found_packages[0].id, "Acme.Web");
        assert!(report.package_found);
        assert_eq!(report.delta_verification.as_ref().map(|d| d.size), Some(1024));
        assert_eq!(report.delta_verification_error, None);
        assert_eq!(report.result_message.as_deref(), Some("done"));
        assert_eq!(report.progress, Some(50));
        assert_eq!(report.actions.len(), 1);
        assert!(vars.is_empty());
    }

    #[test]
    fn test_set_variable_order_and_stickiness() {
        let (mut vars, log, _) = setup();
        vars.set_sensitive("Key", "original");
        {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            sink.on_stdout(&ServiceMessage::set_variable("Key", "first", false).encode());
            sink.on_stdout(&ServiceMessage::set_variable("Key", "second", false).encode());
        }
        assert_eq!(vars.get("Key"), Some("second"));
        assert!(vars.is_sensitive("Key"));
    }

    #[test]
    fn test_message_split_across_lines() {
        let (mut vars, log, _) = setup();
        {
            let mut sink = ServiceMessageSink::new(&mut vars, &log);
            sink.on_stdout("##octopus[setVariable name='R3JlZXRpbmc='");
            sink.on_stdout("value='V29ybGQ=']");
        }
        assert_eq!(vars.get("Greeting"), Some("World"));
    }
}
