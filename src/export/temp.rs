//! Temporary resource registry
//!
//! Every intermediate file, working directory and local artifact of a run is
//! registered here when its path is handed out. [`TempRegistry::release`]
//! removes them all, newest first, at the end of the run whatever its
//! outcome. Removal failures are reported back as `TempFileError`s for the
//! caller to log; they never change the outcome of the run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ExportError, Result};

#[derive(Debug)]
enum TempEntry {
    File(PathBuf),
    Dir(PathBuf),
}

impl TempEntry {
    fn path(&self) -> &Path {
        match self {
            TempEntry::File(path) | TempEntry::Dir(path) => path,
        }
    }
}

/// Scoped registry of temporary files and directories
#[derive(Debug)]
pub struct TempRegistry {
    root: PathBuf,
    entries: Vec<TempEntry>,
}

impl TempRegistry {
    /// Create a registry placing its resources under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
        }
    }

    /// Register a fresh, uniquely named file path under the root
    ///
    /// The file itself is not created.
    ///
    /// # Arguments
    /// * `extension` - File extension without the dot
    pub fn file(&mut self, extension: &str) -> PathBuf {
        let path = self.root.join(format!("{}.{}", Uuid::new_v4(), extension));
        self.track_file(path.clone());
        path
    }

    /// Register a file path created elsewhere
    pub fn track_file(&mut self, path: PathBuf) {
        self.entries.push(TempEntry::File(path));
    }

    /// Create and register a fresh working directory under the root
    pub async fn dir(&mut self) -> Result<PathBuf> {
        let path = self.root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        self.entries.push(TempEntry::Dir(path.clone()));
        Ok(path)
    }

    /// Number of registered resources not yet released
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every registered resource, newest first
    ///
    /// Resources that no longer exist are skipped.
    ///
    /// # Returns
    /// * `Vec<ExportError>` - One `TempFileError` per resource that could
    ///   not be removed
    pub async fn release(&mut self) -> Vec<ExportError> {
        let mut errors = Vec::new();

        while let Some(entry) = self.entries.pop() {
            let outcome = match &entry {
                TempEntry::File(path) => tokio::fs::remove_file(path).await,
                TempEntry::Dir(path) => tokio::fs::remove_dir_all(path).await,
            };
            errors.extend(removal_failure(entry, outcome));
        }

        errors
    }
}

/// Log the outcome of one removal, returning it as an error when it failed
///
/// A resource that is already gone is not a failure.
fn removal_failure(entry: TempEntry, outcome: std::io::Result<()>) -> Option<ExportError> {
    match outcome {
        Ok(()) => {
            debug!("Removed temporary {}", entry.path().display());
            None
        }
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to remove temporary {}: {}", entry.path().display(), e);
            Some(ExportError::TempFile {
                path: entry.path().to_path_buf(),
                source: e,
            })
        }
    }
}

impl Drop for TempRegistry {
    fn drop(&mut self) {
        // Fallback for runs that never reached release(), e.g. a panic.
        let mut failed = 0;
        for entry in self.entries.drain(..).rev() {
            let outcome = match &entry {
                TempEntry::File(path) => std::fs::remove_file(path),
                TempEntry::Dir(path) => std::fs::remove_dir_all(path),
            };
            failed += removal_failure(entry, outcome).map_or(0, |_| 1);
        }
        if failed > 0 {
            warn!("{} temporary resources left behind under {}", failed, self.root.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_release_removes_files_and_dirs() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = TempRegistry::new(root.path());

        let file = registry.file("csv");
        tokio::fs::write(&file, b"a,b\n").await.unwrap();
        let dir = registry.dir().await.unwrap();
        tokio::fs::write(dir.join("layer.geojson"), b"{}").await.unwrap();
        assert_eq!(registry.len(), 2);

        let errors = registry.release().await;
        assert!(errors.is_empty());
        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_missing_files_are_not_errors() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = TempRegistry::new(root.path());
        let never_written = registry.file("zip");

        assert!(registry.release().await.is_empty());
        assert!(!never_written.exists());
    }

    #[tokio::test]
    async fn test_unique_names() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = TempRegistry::new(root.path());
        let a = registry.file("csv");
        let b = registry.file("csv");
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "csv");
        assert!(a.starts_with(root.path()));
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let mut registry = TempRegistry::new(root.path());
            let path = registry.file("kml");
            std::fs::write(&path, b"<kml/>").unwrap();
            path
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_reports_removal_failures() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = TempRegistry::new(root.path());
        // a directory registered as a file cannot be removed with remove_file
        let dir = root.path().join("not-a-file");
        std::fs::create_dir(&dir).unwrap();
        registry.track_file(dir.clone());

        let errors = registry.release().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), "TempFileError");
        assert!(dir.exists());
    }

    #[test]
    fn test_drop_failures_are_reported() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("not-a-file");
        std::fs::create_dir(&dir).unwrap();

        let outcome = std::fs::remove_file(&dir);
        let failure = removal_failure(TempEntry::File(dir.clone()), outcome).unwrap();
        assert_eq!(failure.kind(), "TempFileError");

        let gone = root.path().join("gone.csv");
        let outcome = std::fs::remove_file(&gone);
        assert!(removal_failure(TempEntry::File(gone), outcome).is_none());

        // dropping a registry with an unremovable entry must not panic
        let mut registry = TempRegistry::new(root.path());
        registry.track_file(dir.clone());
        drop(registry);
        assert!(dir.exists());
    }
}
