// src/process/mod.rs

//! Child process execution
//!
//! The pipeline never spawns processes directly. It hands a
//! [`CommandInvocation`] to a [`ProcessRunner`] together with an
//! [`OutputHandler`]; the runner delivers each stdout and stderr line to the
//! handler on the calling thread, in arrival order, and returns the exit
//! code once the child has exited.

use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use tracing::debug;

/// Receives child output one line at a time
///
/// Lines arrive without their trailing newline.
pub trait OutputHandler {
    fn on_stdout(&mut self, line: &str);
    fn on_stderr(&mut self, line: &str);
}

/// Everything needed to start a child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    pub fn new(program: impl Into<String>, working_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable, replacing an earlier value of the same name
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env(key, value);
        self
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.env.push((key, value)),
        }
    }

    /// Environment value set on this invocation
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Program and arguments as one line, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of a finished child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command to completion, streaming its output
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &CommandInvocation, output: &mut dyn OutputHandler) -> Result<ProcessResult>;
}

enum Line {
    Stdout(String),
    Stderr(String),
}

/// Runner backed by `std::process`
///
/// stdin is nulled so an interactive prompt cannot hang the deployment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &CommandInvocation, output: &mut dyn OutputHandler) -> Result<ProcessResult> {
        let program = resolve_program(invocation)?;
        debug!("Starting {} in {}", program.display(), invocation.working_dir.display());

        let mut child = Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::InterpreterNotFound {
                interpreter: invocation.program.clone(),
                reason: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || read_lines(stdout, |line| tx.send(Line::Stdout(line)).is_ok())));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || read_lines(stderr, |line| tx.send(Line::Stderr(line)).is_ok())));
        }
        drop(tx);

        // Ends once both reader threads have dropped their senders
        for line in rx {
            match line {
                Line::Stdout(text) => output.on_stdout(&text),
                Line::Stderr(text) => output.on_stderr(&text),
            }
        }

        for reader in readers {
            if reader.join().is_err() {
                debug!("Output reader thread panicked");
            }
        }

        let status = child.wait()?;
        let exit_code = status.code().unwrap_or(-1);
        debug!("{} exited with code {}", invocation.program, exit_code);

        Ok(ProcessResult { exit_code })
    }
}

/// Locate a bare program name on the PATH the child will see
fn resolve_program(invocation: &CommandInvocation) -> Result<PathBuf> {
    let program = Path::new(&invocation.program);
    if program.components().count() > 1 {
        return Ok(program.to_path_buf());
    }

    let found = match invocation.get_env("PATH") {
        Some(path) => which::which_in(&invocation.program, Some(path), &invocation.working_dir),
        None => which::which(&invocation.program),
    };
    found.map_err(|e| Error::InterpreterNotFound {
        interpreter: invocation.program.clone(),
        reason: e.to_string(),
    })
}

/// Read a stream as lossy UTF-8 lines until EOF or until `send` refuses
fn read_lines<R: Read>(stream: R, mut send: impl FnMut(String) -> bool) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                if !send(String::from_utf8_lossy(&buf).into_owned()) {
                    break;
                }
            }
            Err(e) => {
                debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        stdout: Vec<String>,
        stderr: Vec<String>,
    }

    impl OutputHandler for Collect {
        fn on_stdout(&mut self, line: &str) {
            self.stdout.push(line.to_string());
        }
        fn on_stderr(&mut self, line: &str) {
            self.stderr.push(line.to_string());
        }
    }

    #[test]
    fn test_invocation_builder() {
        let invocation = CommandInvocation::new("bash", Path::new("/tmp"))
            .arg("Bootstrap.sh")
            .args(["a", "b"])
            .env("X", "1")
            .env("X", "2");
        assert_eq!(invocation.command_line(), "bash Bootstrap.sh a b");
        assert_eq!(invocation.get_env("X"), Some("2"));
        assert_eq!(invocation.env.len(), 1);
    }

    #[test]
    fn test_read_lines_strips_line_endings() {
        let mut lines = Vec::new();
        read_lines(&b"one\r\ntwo\n\nthree"[..], |line| {
            lines.push(line);
            true
        });
        assert_eq!(lines, vec!["one", "two", "", "three"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_streams_output_and_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let invocation = CommandInvocation::new("sh", dir.path())
            .arg("-c")
            .arg("echo out; echo err 1>&2; echo \"$GREETING\"; exit 3")
            .env("GREETING", "hello");

        let mut collect = Collect::default();
        let result = SystemProcessRunner.run(&invocation, &mut collect).unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert_eq!(collect.stdout, vec!["out", "hello"]);
        assert_eq!(collect.stderr, vec!["err"]);
    }

    #[test]
    fn test_missing_program_is_known_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let invocation = CommandInvocation::new("definitely-not-an-interpreter-xyz", dir.path());
        let err = SystemProcessRunner.run(&invocation, &mut Collect::default()).unwrap_err();
        assert!(matches!(err, Error::InterpreterNotFound { .. }));
        assert!(err.is_known());
    }
}
