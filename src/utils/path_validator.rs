use crate::error::{CatrunError, Result};
use std::path::{Path, PathBuf};

/// Safe path validation helpers for the workspace and the staged artifact.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises the workspace checkout path.
    pub fn validate_workspace_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            CatrunError::WorkspaceValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(CatrunError::WorkspaceValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(CatrunError::WorkspaceValidation(format!(
                    "Refusing to operate inside system directory '{}'",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Ensures a workspace-relative path stays inside the workspace once
    /// joined. The target itself may not exist yet (the artifact is created
    /// by the categorizer), so containment is checked on the nearest existing
    /// ancestor.
    pub fn ensure_within_workspace(
        relative: impl AsRef<Path>,
        workspace: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let workspace = workspace.as_ref();

        if relative.is_absolute() {
            return Err(CatrunError::WorkspaceValidation(format!(
                "'{}' must be a workspace-relative path",
                relative.display()
            )));
        }

        let canonical_base = workspace.canonicalize().map_err(|e| {
            CatrunError::WorkspaceValidation(format!(
                "Invalid workspace '{}': {e}",
                workspace.display()
            ))
        })?;

        let joined = canonical_base.join(relative);
        let mut probe = joined.as_path();
        let canonical_ancestor = loop {
            match probe.canonicalize() {
                Ok(resolved) => break resolved,
                Err(_) => {
                    probe = probe.parent().ok_or_else(|| {
                        CatrunError::WorkspaceValidation(format!(
                            "No existing ancestor for '{}'",
                            joined.display()
                        ))
                    })?;
                }
            }
        };

        if !canonical_ancestor.starts_with(&canonical_base) {
            return Err(CatrunError::WorkspaceValidation(format!(
                "'{}' escapes the workspace",
                relative.display()
            )));
        }

        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn validate_workspace_path_accepts_directory() {
        let dir = tempdir().unwrap();
        assert!(PathValidator::validate_workspace_path(dir.path()).is_ok());
    }

    #[test]
    fn validate_workspace_path_rejects_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "test").unwrap();
        let err = PathValidator::validate_workspace_path(&file_path).unwrap_err();
        assert!(matches!(err, CatrunError::WorkspaceValidation(_)));
    }

    #[test]
    fn validate_workspace_path_rejects_system_directory() {
        assert!(PathValidator::validate_workspace_path("/etc").is_err());
    }

    #[test]
    fn contained_path_may_not_exist_yet() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        let joined =
            PathValidator::ensure_within_workspace("data/categorized_articles.json", dir.path())
                .unwrap();
        assert!(joined.ends_with("data/categorized_articles.json"));
    }

    #[test]
    fn rejects_traversal() {
        let dir = tempdir().unwrap();
        let result = PathValidator::ensure_within_workspace("../outside.json", dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_relative_path() {
        let dir = tempdir().unwrap();
        let result = PathValidator::ensure_within_workspace("/tmp/out.json", dir.path());
        assert!(result.is_err());
    }
}
