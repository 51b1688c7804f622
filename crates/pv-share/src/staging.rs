//! Private staging area for in-flight encrypted artifacts.
//!
//! Artifacts are deliberately not deleted right after hand-off: the
//! outbound transport may still be reading them. The whole area is
//! swept once at process shutdown.

use anyhow::Context;
use pv_core::PvResult;
use std::path::{Path, PathBuf};

pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Open the staging area, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> PvResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating staging dir: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh subdirectory for one pipeline run.
    pub fn begin_run(&self) -> PvResult<PathBuf> {
        let run_dir = self.root.join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("creating run dir: {}", run_dir.display()))?;
        Ok(run_dir)
    }

    /// Remove every staged artifact. Called once at shutdown.
    pub fn sweep(&self) -> PvResult<()> {
        if !self.root.exists() {
            return Ok(());
        }
        tracing::info!("sweeping staging area: {}", self.root.display());
        std::fs::remove_dir_all(&self.root)
            .with_context(|| format!("sweeping staging dir: {}", self.root.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_dirs_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(dir.path().join("staging")).unwrap();
        let a = staging.begin_run().unwrap();
        let b = staging.begin_run().unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn test_sweep_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(dir.path().join("staging")).unwrap();
        let run = staging.begin_run().unwrap();
        std::fs::write(run.join("doc.pdf.age"), b"ciphertext").unwrap();

        staging.sweep().unwrap();
        assert!(!staging.root().exists());
    }

    #[test]
    fn test_sweep_missing_root_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(dir.path().join("staging")).unwrap();
        std::fs::remove_dir_all(staging.root()).unwrap();
        assert!(staging.sweep().is_ok());
    }
}
