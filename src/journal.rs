// src/journal.rs

//! Append-only deployment journal
//!
//! One JSON record per line, one line per agent run. Writers take an
//! exclusive `flock` on the journal file for the duration of the append so
//! concurrent agents never interleave partial lines.
//!
//! Format: `{json}\n`

use crate::error::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// CLI command that ran
    pub command: String,
    pub package: Option<PathBuf>,
    pub succeeded: bool,
    pub exit_code: i32,
}

impl JournalRecord {
    /// New record stamped now with a fresh id
    pub fn new(command: impl Into<String>, package: Option<&Path>, exit_code: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            command: command.into(),
            package: package.map(Path::to_path_buf),
            succeeded: exit_code == 0,
            exit_code,
        }
    }
}

/// Journal file handle
#[derive(Debug, Clone)]
pub struct DeploymentJournal {
    path: PathBuf,
}

impl DeploymentJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record under an exclusive lock
    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let written = file.write_all(line.as_bytes()).and_then(|()| file.sync_data());
        let unlocked = FileExt::unlock(&file);
        written?;
        unlocked?;

        debug!("Journal record {} appended to {}", record.id, self.path.display());
        Ok(())
    }

    /// Every record, oldest first; a missing journal is empty
    pub fn read_all(&self) -> Result<Vec<JournalRecord>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let journal = DeploymentJournal::new(dir.path().join("state/journal.jsonl"));
        assert!(journal.read_all().unwrap().is_empty());

        journal
            .append(&JournalRecord::new("deploy-package", Some(Path::new("/pkgs/app.tgz")), 0))
            .unwrap();
        journal.append(&JournalRecord::new("run-script", None, 1)).unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].succeeded);
        assert_eq!(records[0].package, Some(PathBuf::from("/pkgs/app.tgz")));
        assert_eq!(records[1].command, "run-script");
        assert!(!records[1].succeeded);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_lines_are_single_json_objects() {
        let dir = TempDir::new().unwrap();
        let journal = DeploymentJournal::new(dir.path().join("journal.jsonl"));
        journal.append(&JournalRecord::new("run-script", None, 100)).unwrap();

        let text = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["exit_code"], 100);
        assert!(value["timestamp"].as_str().is_some());
    }
}
