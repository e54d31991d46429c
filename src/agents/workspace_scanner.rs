use crate::config::PathsConfig;
use crate::error::Result;
use crate::utils::path_validator::PathValidator;
use std::fs;
use std::path::{Path, PathBuf};

/// WorkspaceScannerAgent validates the checkout the run operates on.
pub struct WorkspaceScannerAgent {
    workspace_path: PathBuf,
}

impl WorkspaceScannerAgent {
    pub fn new<P: AsRef<Path>>(workspace_path: P) -> Self {
        Self {
            workspace_path: workspace_path.as_ref().to_path_buf(),
        }
    }

    /// Validates the workspace path and detects the Git checkout.
    pub fn validate(&self) -> Result<WorkspaceInfo> {
        let workspace_path = PathValidator::validate_workspace_path(&self.workspace_path)?;

        let git_dir = workspace_path.join(".git");
        let has_git = git_dir.exists();

        Ok(WorkspaceInfo {
            workspace_path,
            has_git,
        })
    }

    /// Create the data and logs directories. Create-if-absent: running this
    /// on an already-prepared workspace changes nothing.
    pub fn prepare_directories(info: &WorkspaceInfo, paths: &PathsConfig) -> Result<()> {
        fs::create_dir_all(info.workspace_path.join(&paths.data_dir))?;
        fs::create_dir_all(info.workspace_path.join(&paths.logs_dir))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub workspace_path: PathBuf,
    pub has_git: bool,
}
