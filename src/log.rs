// src/log.rs

//! Deployment log passed explicitly through every step
//!
//! All deployment output, including every line a child process prints,
//! goes through a [`DeploymentLog`]. The log masks registered sensitive
//! values before handing the message to its [`LogSink`], so no sink ever
//! sees a secret in plaintext.
//!
//! # Design
//!
//! The `LogSink` trait is the output seam. Implementations:
//! - `TracingSink`: forwards to `tracing` at the matching level
//! - `MemorySink`: records entries, for tests and captured runs
//! - `SilentSink`: discards everything
//! - `FanoutSink`: writes to several sinks, e.g. tracing plus a captured copy

use crate::sensitive::Redactor;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Severity of a deployment log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Detail normally hidden from operators
    Verbose,
    /// Ordinary output
    #[default]
    Info,
    /// Output the operator should notice in the task log
    Highlight,
    /// Output indicating the step is waiting on something
    Wait,
    /// Something went wrong but the step continues
    Warn,
    /// Failure output
    Error,
}

impl LogLevel {
    /// Lowercase display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Highlight => "highlight",
            Self::Wait => "wait",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for already-redacted log messages
pub trait LogSink: Send + Sync {
    /// Write one message
    fn write(&self, level: LogLevel, message: &str);
}

/// Sink forwarding to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Verbose => debug!("{}", message),
            LogLevel::Info | LogLevel::Highlight | LogLevel::Wait => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl LogSink for SilentSink {
    fn write(&self, _level: LogLevel, _message: &str) {}
}

/// A recorded log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Sink recording entries in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries written so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages written so far, without levels
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    /// Whether any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.message.contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: LogLevel, message: &str) {
        self.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

/// Sink writing every message to several sinks in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for FanoutSink {
    fn write(&self, level: LogLevel, message: &str) {
        for sink in &self.sinks {
            sink.write(level, message);
        }
    }
}

/// Redacting log handle
///
/// Cheap to clone; clones share the redactor and the sink.
#[derive(Clone)]
pub struct DeploymentLog {
    redactor: Redactor,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for DeploymentLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentLog")
            .field("sensitive_values", &self.redactor.len())
            .finish_non_exhaustive()
    }
}

impl DeploymentLog {
    /// Create a log masking values known to `redactor`
    pub fn new(redactor: Redactor, sink: Arc<dyn LogSink>) -> Self {
        Self { redactor, sink }
    }

    /// Log to `tracing`
    pub fn tracing(redactor: Redactor) -> Self {
        Self::new(redactor, Arc::new(TracingSink))
    }

    /// Log nowhere
    pub fn silent() -> Self {
        Self::new(Redactor::new(), Arc::new(SilentSink))
    }

    /// The redactor this log masks with
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Write a message at `level`, masking sensitive values
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let masked = self.redactor.mask(message.as_ref());
        self.sink.write(level, &masked);
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Verbose, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn highlight(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Highlight, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensitive::MASK;

    #[test]
    fn test_messages_are_masked_before_sink() {
        let redactor = Redactor::new();
        let sink = Arc::new(MemorySink::new());
        let log = DeploymentLog::new(redactor.clone(), sink.clone());

        redactor.register("hunter2");
        log.info("connecting with hunter2");
        log.error("failed: hunter2");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, format!("connecting with {}", MASK));
        assert_eq!(entries[1].level, LogLevel::Error);
        assert!(!sink.contains("hunter2"));
    }

    #[test]
    fn test_clean_messages_unchanged() {
        let sink = Arc::new(MemorySink::new());
        let log = DeploymentLog::new(Redactor::new(), sink.clone());
        log.verbose("  leading spaces kept ");
        assert_eq!(sink.messages(), vec!["  leading spaces kept ".to_string()]);
    }

    #[test]
    fn test_silent_log() {
        let log = DeploymentLog::silent();
        log.warn("nothing happens");
        assert_eq!(log.redactor().len(), 0);
    }

    #[test]
    fn test_fanout_masks_once_for_every_sink() {
        let redactor = Redactor::new();
        redactor.register("token-123");
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn LogSink>> = vec![first.clone(), second.clone()];
        let log = DeploymentLog::new(redactor, Arc::new(FanoutSink::new(sinks)));

        log.warn("using token-123");
        assert_eq!(first.messages(), vec![format!("using {}", MASK)]);
        assert_eq!(first.entries(), second.entries());
    }
}
