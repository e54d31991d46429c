use crate::error::{CatrunError, Result};
use crate::utils::path_validator::PathValidator;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of the conditional publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The artifact matches the last commit; nothing was committed or pushed.
    Unchanged,
    /// One commit was created and pushed; carries the new HEAD summary.
    Published { head: String },
}

/// VersionControlAgent handles Git operations with hardened input validation.
pub struct VersionControlAgent {
    workspace_path: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(workspace_path: P) -> Result<Self> {
        let workspace_path = Self::validate_git_path(workspace_path.as_ref())?;
        Ok(Self { workspace_path })
    }

    /// Deepen a shallow clone. Commit and push need the full lineage, not the
    /// single-commit history a CI checkout usually starts from.
    pub fn ensure_full_history(&self) -> Result<()> {
        let output = self.run_git(&["rev-parse", "--is-shallow-repository"])?;
        Self::ensure_success(&output, "git rev-parse")?;

        if String::from_utf8_lossy(&output.stdout).trim() == "true" {
            tracing::info!("shallow clone detected, fetching full history");
            let output = self.run_git(&["fetch", "--unshallow"])?;
            Self::ensure_success(&output, "git fetch --unshallow")?;
        }
        Ok(())
    }

    /// Set the committer identity for this repository only.
    pub fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        let output = self.run_git(&["config", "user.name", name])?;
        Self::ensure_success(&output, "git config user.name")?;
        let output = self.run_git(&["config", "user.email", email])?;
        Self::ensure_success(&output, "git config user.email")?;
        Ok(())
    }

    /// Stage the output artifact.
    pub fn stage_output(&self, output_rel: &str) -> Result<()> {
        PathValidator::ensure_within_workspace(output_rel, &self.workspace_path)
            .map_err(|err| CatrunError::GitOperation(format!("Refusing to stage unsafe path: {err}")))?;

        let output = self.run_git(&["add", output_rel])?;
        Self::ensure_success(&output, "git add")?;
        Ok(())
    }

    /// True when the artifact differs from HEAD in the working tree or the
    /// index. Both checks run, matching the source workflow; after staging,
    /// the `--cached` comparison is the deciding one.
    pub fn has_pending_changes(&self, output_rel: &str) -> Result<bool> {
        let unstaged = {
            let output = self.run_git(&["diff", "--quiet", "--", output_rel])?;
            Self::interpret_diff_status(output.status.code(), &output.stderr, "git diff")?
        };
        let staged = {
            let output = self.run_git(&["diff", "--cached", "--quiet", "--", output_rel])?;
            Self::interpret_diff_status(output.status.code(), &output.stderr, "git diff --cached")?
        };
        Ok(unstaged || staged)
    }

    /// Commit staged changes with the configured message.
    pub fn commit(&self, message: &str) -> Result<()> {
        let output = self.run_git(&["commit", "-m", message])?;
        Self::ensure_success(&output, "git commit")?;
        Ok(())
    }

    /// Push to the configured remote and branch. A rejected push (the remote
    /// advanced concurrently) surfaces as a GitOperation error; the next
    /// scheduled run re-evaluates from current state.
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        let output = self.run_git(&["push", remote, &format!("HEAD:{branch}")])?;
        Self::ensure_success(&output, "git push")?;
        Ok(())
    }

    /// One-line summary of HEAD, for reporting.
    pub fn head_summary(&self) -> Result<String> {
        let output = self.run_git(&["log", "-1", "--format=%h %s"])?;
        Self::ensure_success(&output, "git log")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Stage the artifact and publish it only when it actually changed.
    /// Re-running on unchanged output is a no-op, so a run that failed after
    /// this point can simply be retried.
    pub fn publish_if_changed(
        &self,
        output_rel: &str,
        message: &str,
        remote: &str,
        branch: &str,
    ) -> Result<PublishOutcome> {
        self.stage_output(output_rel)?;

        if !self.has_pending_changes(output_rel)? {
            tracing::info!(path = output_rel, "no changes detected, skipping publish");
            return Ok(PublishOutcome::Unchanged);
        }

        self.commit(message)?;
        self.push(remote, branch)?;
        let head = self.head_summary()?;
        tracing::info!(%head, "published");
        Ok(PublishOutcome::Published { head })
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.workspace_path)
            .args(args)
            .output()
            .map_err(|e| {
                CatrunError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(CatrunError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        )))
    }

    /// `git diff --quiet` exits 0 when clean and 1 when the path differs;
    /// anything else is a real failure.
    fn interpret_diff_status(code: Option<i32>, stderr: &[u8], command: &str) -> Result<bool> {
        match code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(CatrunError::GitOperation(format!(
                "{} failed: {}",
                command,
                String::from_utf8_lossy(stderr)
            ))),
        }
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(CatrunError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        if !path.is_absolute() {
            return Err(CatrunError::GitOperation(
                "Only absolute paths are allowed for Git operations".to_string(),
            ));
        }

        PathValidator::validate_workspace_path(path)
            .map_err(|err| CatrunError::GitOperation(format!("Invalid Git path: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, tempdir_in, TempDir};

    const OUTPUT_REL: &str = "data/categorized_articles.json";

    fn git(workspace: &Path, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(workspace)
            .args(args)
            .output()
            .expect("git not available");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Workspace clone with an initial artifact commit, plus a bare remote
    /// named `origin` so pushes have somewhere to land.
    fn init_workspace() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let remote = dir.path().join("remote.git");
        let workspace = dir.path().join("work");
        fs::create_dir_all(&workspace).unwrap();

        git(dir.path(), &["init", "--bare", "remote.git"]);
        git(&workspace, &["init", "-b", "main"]);
        git(&workspace, &["config", "user.name", "tester"]);
        git(&workspace, &["config", "user.email", "tester@example.com"]);

        fs::create_dir_all(workspace.join("data")).unwrap();
        fs::write(workspace.join(OUTPUT_REL), "{\"articles\": []}\n").unwrap();
        git(&workspace, &["add", OUTPUT_REL]);
        git(&workspace, &["commit", "-m", "seed"]);
        git(
            &workspace,
            &["remote", "add", "origin", remote.to_str().unwrap()],
        );
        git(&workspace, &["push", "origin", "main"]);

        (dir, workspace)
    }

    fn commit_count(workspace: &Path) -> usize {
        let output = Command::new("git")
            .current_dir(workspace)
            .args(["rev-list", "--count", "HEAD"])
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap()
    }

    #[test]
    fn rejects_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let temp = tempdir_in(&cwd).unwrap();
        let relative = PathBuf::from(temp.path().file_name().unwrap());
        assert!(VersionControlAgent::new(&relative).is_err());
    }

    #[test]
    fn rejects_dangerous_paths() {
        let dir = tempdir().unwrap();
        let dangerous = dir.path().join("sub;dir");
        fs::create_dir_all(&dangerous).unwrap();
        assert!(VersionControlAgent::new(dangerous).is_err());
    }

    #[test]
    fn diff_status_mapping() {
        assert!(!VersionControlAgent::interpret_diff_status(Some(0), b"", "git diff").unwrap());
        assert!(VersionControlAgent::interpret_diff_status(Some(1), b"", "git diff").unwrap());
        assert!(VersionControlAgent::interpret_diff_status(Some(129), b"fatal", "git diff").is_err());
        assert!(VersionControlAgent::interpret_diff_status(None, b"", "git diff").is_err());
    }

    #[test]
    fn unchanged_artifact_is_a_noop() {
        let (_dir, workspace) = init_workspace();
        let agent = VersionControlAgent::new(&workspace).unwrap();

        let before = commit_count(&workspace);
        let outcome = agent
            .publish_if_changed(OUTPUT_REL, "Update categorized articles [skip ci]", "origin", "main")
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Unchanged);
        assert_eq!(commit_count(&workspace), before);
    }

    #[test]
    fn changed_artifact_is_committed_with_marker_and_pushed() {
        let (_dir, workspace) = init_workspace();
        let agent = VersionControlAgent::new(&workspace).unwrap();

        fs::write(
            workspace.join(OUTPUT_REL),
            "{\"articles\": [{\"id\": 1, \"category\": \"tech\"}]}\n",
        )
        .unwrap();

        let before = commit_count(&workspace);
        let outcome = agent
            .publish_if_changed(OUTPUT_REL, "Update categorized articles [skip ci]", "origin", "main")
            .unwrap();

        match outcome {
            PublishOutcome::Published { head } => assert!(head.contains("[skip ci]")),
            PublishOutcome::Unchanged => panic!("expected a publish"),
        }
        assert_eq!(commit_count(&workspace), before + 1);

        // The remote received the commit
        let output = Command::new("git")
            .current_dir(&workspace)
            .args(["rev-parse", "origin/main", "HEAD"])
            .output()
            .unwrap();
        let hashes: Vec<_> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn publish_twice_is_a_noop_the_second_time() {
        let (_dir, workspace) = init_workspace();
        let agent = VersionControlAgent::new(&workspace).unwrap();

        fs::write(workspace.join(OUTPUT_REL), "{\"articles\": [1]}\n").unwrap();

        let first = agent
            .publish_if_changed(OUTPUT_REL, "Update categorized articles [skip ci]", "origin", "main")
            .unwrap();
        assert!(matches!(first, PublishOutcome::Published { .. }));

        let second = agent
            .publish_if_changed(OUTPUT_REL, "Update categorized articles [skip ci]", "origin", "main")
            .unwrap();
        assert_eq!(second, PublishOutcome::Unchanged);
    }

    #[test]
    fn configure_identity_sets_repo_config() {
        let (_dir, workspace) = init_workspace();
        let agent = VersionControlAgent::new(&workspace).unwrap();
        agent
            .configure_identity("bot", "bot@example.com")
            .unwrap();

        let output = Command::new("git")
            .current_dir(&workspace)
            .args(["config", "user.name"])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "bot");
    }

    #[test]
    fn full_history_on_non_shallow_clone_is_a_noop() {
        let (_dir, workspace) = init_workspace();
        let agent = VersionControlAgent::new(&workspace).unwrap();
        agent.ensure_full_history().unwrap();
    }
}
