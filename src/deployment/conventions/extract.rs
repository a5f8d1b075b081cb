// src/deployment/conventions/extract.rs

//! Package extraction into the staging directory

use crate::deployment::{Convention, DeploymentContext};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::log::DeploymentLog;
use crate::variables::names;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tar::Archive;
use tracing::debug;
use walkdir::WalkDir;

/// Directory under the working directory that packages are extracted into
pub const STAGING_DIR: &str = "staging";

/// Unpacks a package archive
pub trait PackageExtractor: Send + Sync {
    /// Whether this extractor understands the file
    fn supports(&self, package: &Path) -> bool;

    /// Extract into `destination` (already created); returns the number of files written
    fn extract(&self, package: &Path, destination: &Path) -> Result<usize>;
}

/// `.tar`, `.tar.gz` and `.tgz` packages
#[derive(Debug, Default, Clone, Copy)]
pub struct TarPackageExtractor;

impl TarPackageExtractor {
    fn is_gzip(package: &Path) -> bool {
        let name = package.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn unpack<R: Read>(reader: R, destination: &Path) -> Result<()> {
        let mut archive = Archive::new(reader);
        archive.set_preserve_permissions(true);
        // Entries escaping the destination are skipped by unpack
        archive
            .unpack(destination)
            .map_err(|e| Error::Extraction(e.to_string()))
    }
}

impl PackageExtractor for TarPackageExtractor {
    fn supports(&self, package: &Path) -> bool {
        let name = package.to_string_lossy().to_lowercase();
        Self::is_gzip(package) || name.ends_with(".tar")
    }

    fn extract(&self, package: &Path, destination: &Path) -> Result<usize> {
        let file = File::open(package)?;
        if Self::is_gzip(package) {
            Self::unpack(GzDecoder::new(file), destination)?;
        } else {
            Self::unpack(file, destination)?;
        }

        let count = WalkDir::new(destination)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .count();
        Ok(count)
    }
}

/// Extracts the context's package and moves the run into the extracted tree
pub struct ExtractPackageConvention {
    fs: Arc<dyn FileSystem>,
    extractor: Box<dyn PackageExtractor>,
}

impl ExtractPackageConvention {
    /// Tarball packages on `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            extractor: Box::new(TarPackageExtractor),
        }
    }

    /// Replace the archive reader
    pub fn with_extractor(mut self, extractor: Box<dyn PackageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }
}

impl Convention for ExtractPackageConvention {
    fn name(&self) -> &str {
        "extract-package"
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        context.package().is_some()
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        let Some(package) = context.package().map(Path::to_path_buf) else {
            return Ok(());
        };
        if !self.fs.exists(&package) {
            return Err(Error::PackageNotFound(package));
        }
        if !self.extractor.supports(&package) {
            return Err(Error::Extraction(format!(
                "unsupported package format: {}",
                package.display()
            )));
        }

        let destination = context.working_dir().join(STAGING_DIR);
        self.fs.create_dir_all(&destination)?;

        log.verbose(format!(
            "Extracting package {} to {}",
            package.display(),
            destination.display()
        ));
        let count = self.extractor.extract(&package, &destination)?;
        debug!("Extracted {} files from {}", count, package.display());
        log.info(format!("Extracted {} files", count));

        let installed = destination.to_string_lossy().into_owned();
        context.variables.set(names::INSTALLATION_DIRECTORY, installed);
        context.variables.set(names::EXTRACTED_FILE_COUNT, count.to_string());
        context.set_working_dir(destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::PhysicalFileSystem;
    use crate::variables::VariableStore;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_package(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extracts_and_records_installation_directory() {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("Acme.Web.1.0.0.tar.gz");
        write_package(&package, &[("Deploy.sh", "echo hi"), ("conf/app.config", "x")]);

        let mut ctx = DeploymentContext::new(VariableStore::new(), dir.path()).with_package(&package);
        let convention = ExtractPackageConvention::new(Arc::new(PhysicalFileSystem));
        assert!(convention.applicable(&ctx));
        convention.execute(&mut ctx, &DeploymentLog::silent()).unwrap();

        let staging = dir.path().join(STAGING_DIR);
        assert!(staging.join("conf/app.config").is_file());
        assert_eq!(ctx.working_dir(), staging.as_path());
        assert_eq!(ctx.variables.get(names::EXTRACTED_FILE_COUNT), Some("2"));
        assert_eq!(
            ctx.variables.get(names::INSTALLATION_DIRECTORY),
            Some(staging.to_string_lossy().as_ref())
        );
    }

    #[test]
    fn test_missing_package_is_known_failure() {
        let dir = TempDir::new().unwrap();
        let mut ctx =
            DeploymentContext::new(VariableStore::new(), dir.path()).with_package(dir.path().join("absent.tgz"));
        let err = ExtractPackageConvention::new(Arc::new(PhysicalFileSystem))
            .execute(&mut ctx, &DeploymentLog::silent())
            .unwrap_err();
        assert!(matches!(err, Error::PackageNotFound(_)));
        assert!(err.is_known());
    }

    /// File system that knows only the paths it was given
    #[derive(Default)]
    struct ListedFileSystem {
        existing: Vec<PathBuf>,
        created: Mutex<Vec<PathBuf>>,
    }

    impl FileSystem for ListedFileSystem {
        fn exists(&self, path: &Path) -> bool {
            self.existing.iter().any(|p| p == path)
        }

        fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
            Err(Error::FileNotFound(path.to_path_buf()))
        }

        fn write_bytes(&self, _path: &Path, _contents: &[u8]) -> Result<()> {
            Ok(())
        }

        fn delete(&self, _path: &Path) {}

        fn create_dir_all(&self, path: &Path) -> Result<()> {
            self.created.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn find_files(&self, _root: &Path, _pattern: &str) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    /// Extractor that only records where it was asked to unpack
    #[derive(Default)]
    struct RecordingExtractor {
        destinations: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl PackageExtractor for RecordingExtractor {
        fn supports(&self, _package: &Path) -> bool {
            true
        }

        fn extract(&self, _package: &Path, destination: &Path) -> Result<usize> {
            self.destinations.lock().unwrap().push(destination.to_path_buf());
            Ok(3)
        }
    }

    #[test]
    fn test_file_system_is_the_only_disk_access() {
        let package = PathBuf::from("/packages/Acme.Web.1.0.0.zip");
        let fs = Arc::new(ListedFileSystem {
            existing: vec![package.clone()],
            ..ListedFileSystem::default()
        });
        let extractor = RecordingExtractor::default();
        let destinations = extractor.destinations.clone();
        let convention = ExtractPackageConvention::new(fs.clone()).with_extractor(Box::new(extractor));

        let mut ctx = DeploymentContext::new(VariableStore::new(), "/work").with_package(&package);
        convention.execute(&mut ctx, &DeploymentLog::silent()).unwrap();

        let staging = Path::new("/work").join(STAGING_DIR);
        assert_eq!(*fs.created.lock().unwrap(), vec![staging.clone()]);
        assert_eq!(*destinations.lock().unwrap(), vec![staging.clone()]);
        assert_eq!(ctx.working_dir(), staging.as_path());
        assert_eq!(ctx.variables.get(names::EXTRACTED_FILE_COUNT), Some("3"));
    }

    #[test]
    fn test_package_unknown_to_file_system_is_not_found() {
        let convention = ExtractPackageConvention::new(Arc::new(ListedFileSystem::default()));
        let mut ctx = DeploymentContext::new(VariableStore::new(), "/work").with_package("/packages/app.tgz");
        let err = convention.execute(&mut ctx, &DeploymentLog::silent()).unwrap_err();
        assert!(matches!(err, Error::PackageNotFound(_)));
    }

    #[test]
    fn test_not_applicable_without_package() {
        let ctx = DeploymentContext::new(VariableStore::new(), "/work");
        assert!(!ExtractPackageConvention::new(Arc::new(PhysicalFileSystem)).applicable(&ctx));
        assert!(TarPackageExtractor.supports(Path::new("a.TGZ")));
        assert!(!TarPackageExtractor.supports(Path::new("a.zip")));
    }
}
