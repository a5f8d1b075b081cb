// src/fs.rs

//! File system collaborator
//!
//! Conventions and bootstrappers touch the disk only through [`FileSystem`],
//! so tests can observe what was written and deleted.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Minimal file operations needed by a deployment
pub trait FileSystem: Send + Sync {
    /// Whether a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Read the whole file
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write the whole file, creating or truncating it
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Delete a file, ignoring any failure
    fn delete(&self, path: &Path);

    /// Create a directory and its parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Files under `root` matching a relative glob pattern
    fn find_files(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Read the whole file as UTF-8
    fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::deployment(format!("File {} is not valid UTF-8: {}", path.display(), e))
        })
    }

    /// Write text as UTF-8
    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_bytes(path, contents.as_bytes())
    }
}

/// The real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalFileSystem;

impl FileSystem for PhysicalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })
    }

    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn delete(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!("Could not delete {}: {}", path.display(), e);
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn find_files(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let full = root.join(pattern);
        let full = full.to_string_lossy();
        let paths = glob::glob(&full).map_err(|e| Error::InvalidVariable {
            name: pattern.to_string(),
            reason: format!("invalid file pattern: {}", e),
        })?;

        let mut files = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable path: {}", e),
            }
        }
        files.sort();
        Ok(files)
    }
}

/// A file deleted when the guard goes out of scope
///
/// Deletion failures are ignored, so dropping never panics.
pub struct TemporaryFile {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl TemporaryFile {
    /// Write `contents` to `path` and take ownership of its deletion
    pub fn create(fs: Arc<dyn FileSystem>, path: PathBuf, contents: &[u8]) -> Result<Self> {
        let guard = Self { path, fs };
        guard.fs.write_bytes(&guard.path, contents)?;
        Ok(guard)
    }

    /// Path of the guarded file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for TemporaryFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryFile").field("path", &self.path).finish()
    }
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        self.fs.delete(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/file.txt");
        let fs = PhysicalFileSystem;

        fs.write_text(&path, "héllo").unwrap();
        assert!(fs.exists(&path));
        assert_eq!(fs.read_text(&path).unwrap(), "héllo");
    }

    #[test]
    fn test_read_missing_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let err = PhysicalFileSystem.read_bytes(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_delete_missing_is_ignored() {
        let dir = TempDir::new().unwrap();
        PhysicalFileSystem.delete(&dir.path().join("absent"));
    }

    #[test]
    fn test_temporary_file_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Bootstrap.sh");
        {
            let guard =
                TemporaryFile::create(Arc::new(PhysicalFileSystem), path.clone(), b"echo hi").unwrap();
            assert!(guard.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_find_files() {
        let dir = TempDir::new().unwrap();
        let fs = PhysicalFileSystem;
        fs.write_text(&dir.path().join("a.config"), "").unwrap();
        fs.write_text(&dir.path().join("sub/b.config"), "").unwrap();
        fs.write_text(&dir.path().join("c.txt"), "").unwrap();

        let top = fs.find_files(dir.path(), "*.config").unwrap();
        assert_eq!(top, vec![dir.path().join("a.config")]);

        let all = fs.find_files(dir.path(), "**/*.config").unwrap();
        assert_eq!(all.len(), 2);
    }
}
