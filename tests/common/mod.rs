// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use conveyor::config::AgentConfig;
use conveyor::fs::PhysicalFileSystem;
use conveyor::log::{DeploymentLog, MemorySink};
use conveyor::process::{CommandInvocation, OutputHandler, ProcessResult, ProcessRunner};
use conveyor::scripting::ScriptEngine;
use conveyor::sensitive::{Redactor, VariableEncryptor};
use conveyor::variables::VariableStore;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One scripted child process
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
}

impl FakeRun {
    pub fn stdout(lines: &[&str]) -> Self {
        Self {
            stdout: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

/// What the runner saw when asked to run
#[derive(Debug, Clone)]
pub struct SeenRun {
    pub invocation: CommandInvocation,
    /// Files in the working directory during the run, with their text
    pub files: Vec<(PathBuf, String)>,
}

/// Process runner that replays scripted output instead of spawning
#[derive(Debug, Default)]
pub struct FakeProcessRunner {
    runs: Mutex<Vec<FakeRun>>,
    seen: Mutex<Vec<SeenRun>>,
}

impl FakeProcessRunner {
    /// Runs are consumed in order; once exhausted every run exits 0 silently
    pub fn new(runs: Vec<FakeRun>) -> Self {
        Self {
            runs: Mutex::new(runs.into_iter().rev().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SeenRun> {
        self.seen.lock().unwrap().clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, invocation: &CommandInvocation, output: &mut dyn OutputHandler) -> conveyor::Result<ProcessResult> {
        let mut files: Vec<(PathBuf, String)> = std::fs::read_dir(&invocation.working_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .map(|p| {
                let text = String::from_utf8_lossy(&std::fs::read(&p).unwrap()).into_owned();
                (p, text)
            })
            .collect();
        files.sort();
        self.seen.lock().unwrap().push(SeenRun {
            invocation: invocation.clone(),
            files,
        });

        let run = self.runs.lock().unwrap().pop().unwrap_or_default();
        for line in &run.stdout {
            output.on_stdout(line);
        }
        for line in &run.stderr {
            output.on_stderr(line);
        }
        Ok(ProcessResult {
            exit_code: run.exit_code,
        })
    }
}

/// Engine with every bootstrapper, backed by `runner`
pub fn engine(runner: Arc<dyn ProcessRunner>) -> Arc<ScriptEngine> {
    Arc::new(ScriptEngine::from_config(
        &AgentConfig::default(),
        runner,
        Arc::new(PhysicalFileSystem),
        Arc::new(VariableEncryptor::generate()),
    ))
}

/// A store and a log sharing one redactor, with the log captured in memory
pub fn store_and_log() -> (VariableStore, DeploymentLog, Arc<MemorySink>) {
    let redactor = Redactor::new();
    let memory = Arc::new(MemorySink::new());
    let log = DeploymentLog::new(redactor.clone(), memory.clone());
    (VariableStore::with_redactor(redactor), log, memory)
}
