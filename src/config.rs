use crate::error::{CatrunError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration, mapped from `catrun.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub paths: PathsConfig,
    pub setup: SetupConfig,
    pub categorizer: CategorizerConfig,
    pub publish: PublishConfig,
    pub run: RunControlConfig,
}

/// Workspace-relative locations the runner reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
    pub logs_dir: String,
    pub output_file: String,
    pub log_file: String,
}

impl PathsConfig {
    /// Repo-relative pathspec of the output artifact, always with forward
    /// slashes so it can be handed to Git directly.
    pub fn output_rel(&self) -> String {
        format!("{}/{}", self.data_dir, self.output_file)
    }
}

/// Environment preparation that runs before the categorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Verify the categorizer runtime responds to `--version` before running.
    pub check_runtime: bool,
    /// Dependency install command as an argv list; empty disables the step.
    pub install_command: Vec<String>,
}

/// How the external categorizer subprocess is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Wall-clock bound in seconds; 0 disables the bound.
    pub timeout_secs: u64,
    /// Environment variable holding the API secret. Read from the runner's
    /// environment at run time and injected only into the subprocess.
    pub api_key_env: String,
    /// Environment variable set to "1" to disable the subprocess's output
    /// buffering.
    pub unbuffered_env: String,
    /// Parse the output artifact after the subprocess exits and fail the run
    /// if it is missing or malformed.
    pub validate_output: bool,
}

/// Git identity and publish target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub committer_name: String,
    pub committer_email: String,
    pub remote: String,
    pub branch: String,
    /// Must contain `skip_ci_marker` so the trigger system does not re-run
    /// itself on the published commit.
    pub commit_message: String,
    pub skip_ci_marker: String,
}

/// Run-exclusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunControlConfig {
    /// Lock file name, relative to the workspace root.
    pub lock_file: String,
    /// A lock older than this is treated as left over from a crashed run and
    /// taken over; 0 disables takeover.
    pub stale_lock_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            setup: SetupConfig::default(),
            categorizer: CategorizerConfig::default(),
            publish: PublishConfig::default(),
            run: RunControlConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            logs_dir: "logs".to_string(),
            output_file: "categorized_articles.json".to_string(),
            log_file: "catrun.log".to_string(),
        }
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            check_runtime: true,
            install_command: Vec::new(),
        }
    }
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["ai_category.py".to_string()],
            timeout_secs: 600,
            api_key_env: "MISTRAL_API_KEY".to_string(),
            unbuffered_env: "PYTHONUNBUFFERED".to_string(),
            validate_output: true,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            committer_name: "github-actions[bot]".to_string(),
            committer_email: "github-actions[bot]@users.noreply.github.com".to_string(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            commit_message: "Update categorized articles [skip ci]".to_string(),
            skip_ci_marker: "[skip ci]".to_string(),
        }
    }
}

impl Default for RunControlConfig {
    fn default() -> Self {
        Self {
            lock_file: ".catrun.lock".to_string(),
            stale_lock_secs: 3600,
        }
    }
}

impl RunnerConfig {
    /// Resolve the config path: explicit flag > CATRUN_CONFIG env > workspace default.
    pub fn resolve_path(explicit: Option<&Path>, workspace_path: &Path) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var("CATRUN_CONFIG") {
            return PathBuf::from(path);
        }
        workspace_path.join("catrun.toml")
    }

    /// Load the config from disk, falling back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>, workspace_path: &Path) -> Result<Self> {
        let config_path = Self::resolve_path(explicit, workspace_path);
        let config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            toml::from_str::<RunnerConfig>(&raw)?
        } else {
            if explicit.is_some() {
                return Err(CatrunError::Config(format!(
                    "config file '{}' not found",
                    config_path.display()
                )));
            }
            RunnerConfig::default()
        };

        Ok(config)
    }

    /// Validate the config. Hard problems are errors; soft problems come back
    /// as warnings for the caller to display.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if self.categorizer.command.trim().is_empty() {
            return Err(CatrunError::Config(
                "categorizer.command must not be empty".to_string(),
            ));
        }
        if self.categorizer.api_key_env.trim().is_empty() {
            return Err(CatrunError::Config(
                "categorizer.api_key_env must not be empty".to_string(),
            ));
        }
        if self.publish.remote.trim().is_empty() || self.publish.branch.trim().is_empty() {
            return Err(CatrunError::Config(
                "publish.remote and publish.branch must not be empty".to_string(),
            ));
        }
        if !self
            .publish
            .commit_message
            .contains(&self.publish.skip_ci_marker)
        {
            return Err(CatrunError::Config(format!(
                "publish.commit_message must contain the skip-CI marker '{}'",
                self.publish.skip_ci_marker
            )));
        }

        if self.categorizer.timeout_secs == 0 {
            warnings.push("categorizer.timeout_secs is 0: the subprocess has no wall-clock bound".to_string());
        }
        if !self.categorizer.validate_output {
            warnings.push("categorizer.validate_output is disabled: malformed output will be published".to_string());
        }

        Ok(warnings)
    }
}
