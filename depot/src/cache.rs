//! On-disk artifact cache with a staging area.
//!
//! Downloads are streamed into a staging directory first and only moved to
//! the final cache location by an atomic rename after full validation, so a
//! crash or cancel mid-transfer can never corrupt a previously verified
//! artifact. Layout below the cache root:
//!
//! ```text
//! <root>/<cache_file_name>            verified artifacts
//! <root>/partial/<cache_file_name>    in-flight staging files
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Subdirectory holding not-yet-verified staging files.
const PARTIAL_DIR: &str = "partial";

/// Artifact storage rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Creates a cache rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of a verified artifact.
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Staging location of an in-flight download.
    pub fn staging_path(&self, name: &str) -> PathBuf {
        self.root.join(PARTIAL_DIR).join(name)
    }

    /// Returns true if a verified artifact is present.
    ///
    /// This is the local presence check run before any network activity.
    pub fn contains(&self, name: &str) -> bool {
        self.final_path(name).is_file()
    }

    /// Prepares the staging location for a fresh transfer.
    ///
    /// Creates the staging directory and removes any stale partial file
    /// left behind by an earlier crash or cancellation.
    pub fn prepare_staging(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.staging_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::remove_file(&path) {
            Ok(()) => debug!(file = %path.display(), "removed stale staging file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        Ok(path)
    }

    /// Promotes a fully validated staging file to its final location.
    ///
    /// The rename is atomic within the cache filesystem.
    pub fn promote(&self, name: &str) -> io::Result<PathBuf> {
        let staging = self.staging_path(name);
        let target = self.final_path(name);
        fs::create_dir_all(&self.root)?;
        fs::rename(&staging, &target)?;
        debug!(file = %target.display(), "artifact promoted to cache");
        Ok(target)
    }

    /// Deletes the staging file for `name`, ignoring absence.
    pub fn discard(&self, name: &str) {
        let path = self.staging_path(name);
        match fs::remove_file(&path) {
            Ok(()) => debug!(file = %path.display(), "staging file discarded"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => debug!(file = %path.display(), error = %err, "failed to discard staging file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_contains_is_false_for_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());
        assert!(!cache.contains("a.zip"));
    }

    #[test]
    fn test_promote_moves_staging_to_final() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());

        let staging = cache.prepare_staging("a.zip").unwrap();
        let mut file = File::create(&staging).unwrap();
        file.write_all(b"artifact bytes").unwrap();

        let target = cache.promote("a.zip").unwrap();

        assert!(cache.contains("a.zip"));
        assert_eq!(target, cache.final_path("a.zip"));
        assert!(!staging.exists());
        assert_eq!(fs::read(&target).unwrap(), b"artifact bytes");
    }

    #[test]
    fn test_prepare_staging_removes_stale_partial() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());

        let staging = cache.prepare_staging("a.zip").unwrap();
        fs::write(&staging, b"stale").unwrap();

        let fresh = cache.prepare_staging("a.zip").unwrap();
        assert_eq!(fresh, staging);
        assert!(!fresh.exists());
    }

    #[test]
    fn test_discard_ignores_missing_file() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());
        // No staging file exists; must not panic.
        cache.discard("a.zip");
    }

    #[test]
    fn test_discard_removes_staging_file() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());

        let staging = cache.prepare_staging("a.zip").unwrap();
        fs::write(&staging, b"partial").unwrap();

        cache.discard("a.zip");
        assert!(!staging.exists());
    }

    #[test]
    fn test_promote_fails_without_staging_file() {
        let temp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(temp.path());
        assert!(cache.promote("missing.zip").is_err());
    }
}
