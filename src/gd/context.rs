//! Per-run context: run identifier and model artifact handling

use crate::error::GdResult;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Values shared by every component of a single run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub artifact_dir: PathBuf,
    pub keep_artifacts: bool,
}

impl RunContext {
    /// Fresh context with a random run id; `None` uses the system temp dir
    pub fn new(artifact_dir: Option<PathBuf>, keep_artifacts: bool) -> Self {
        Self::with_run_id(Uuid::new_v4().simple().to_string(), artifact_dir, keep_artifacts)
    }

    pub fn with_run_id(
        run_id: impl Into<String>,
        artifact_dir: Option<PathBuf>,
        keep_artifacts: bool,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            artifact_dir: artifact_dir.unwrap_or_else(std::env::temp_dir),
            keep_artifacts,
        }
    }

    /// Unique model file name for this run
    pub fn artifact_path(&self, guess_budget: usize, max_steps: usize) -> PathBuf {
        self.artifact_dir.join(format!(
            "gdmodel_mg{}_ms{}_{}.mzn",
            guess_budget, max_steps, self.run_id
        ))
    }

    /// Write the rendered model and return a handle that owns its cleanup
    pub fn write_model(
        &self,
        text: &str,
        guess_budget: usize,
        max_steps: usize,
    ) -> GdResult<ModelArtifact> {
        std::fs::create_dir_all(&self.artifact_dir)?;
        let path = self.artifact_path(guess_budget, max_steps);
        std::fs::write(&path, text)?;
        debug!("Model written to {}", path.display());

        Ok(ModelArtifact {
            path,
            keep: self.keep_artifacts,
        })
    }
}

/// A model file on disk
#[derive(Debug)]
pub struct ModelArtifact {
    path: PathBuf,
    keep: bool,
}

impl ModelArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file unless artifacts are kept
    pub fn finish(self) -> GdResult<()> {
        if self.keep {
            debug!("Keeping model file {}", self.path.display());
            return Ok(());
        }
        std::fs::remove_file(&self.path)?;
        Ok(())
    }

    /// Leave the file in place after a failure so it can be inspected
    pub fn retain(self) -> PathBuf {
        warn!("Model file retained for inspection: {}", self.path.display());
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new(None, false);
        let b = RunContext::new(None, false);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.artifact_dir, std::env::temp_dir());
    }

    #[test]
    fn test_artifact_naming() {
        let context = RunContext::with_run_id("abc", Some(PathBuf::from("/work")), false);
        assert_eq!(
            context.artifact_path(3, 7),
            PathBuf::from("/work/gdmodel_mg3_ms7_abc.mzn")
        );
    }

    #[test]
    fn test_artifact_cleanup_policy() {
        let temp_dir = tempdir().unwrap();
        let dir = Some(temp_dir.path().join("models"));

        let context = RunContext::with_run_id("drop", dir.clone(), false);
        let artifact = context.write_model("solve satisfy;\n", 1, 1).unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        artifact.finish().unwrap();
        assert!(!path.exists());

        let context = RunContext::with_run_id("keep", dir.clone(), true);
        let artifact = context.write_model("solve satisfy;\n", 1, 1).unwrap();
        let path = artifact.path().to_path_buf();
        artifact.finish().unwrap();
        assert!(path.exists());

        let context = RunContext::with_run_id("failed", dir, false);
        let artifact = context.write_model("solve satisfy;\n", 2, 1).unwrap();
        let path = artifact.retain();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "solve satisfy;\n");
    }
}
