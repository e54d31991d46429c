use crate::config::CategorizerConfig;
use crate::error::{CatrunError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// How many trailing stderr lines are kept for the failure message.
const STDERR_TAIL_LINES: usize = 8;

/// CategorizerExecutionAgent runs the external categorizer subprocess.
pub struct CategorizerExecutionAgent {
    config: CategorizerConfig,
    workspace_path: PathBuf,
}

impl CategorizerExecutionAgent {
    pub fn new<P: AsRef<Path>>(config: CategorizerConfig, workspace_path: P) -> Self {
        Self {
            config,
            workspace_path: workspace_path.as_ref().to_path_buf(),
        }
    }

    /// Verify the configured runtime is present before spending API budget.
    /// Returns the version line the runtime reports.
    pub fn check_runtime(&self) -> Result<String> {
        let output = Command::new(&self.config.command)
            .arg("--version")
            .output()
            .map_err(|e| {
                CatrunError::Setup(format!(
                    "runtime '{}' is not available: {e}",
                    self.config.command
                ))
            })?;

        if !output.status.success() {
            return Err(CatrunError::Setup(format!(
                "'{} --version' failed with exit code {}",
                self.config.command,
                output.status.code().unwrap_or(-1)
            )));
        }

        // Some runtimes report the version on stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = if stdout.trim().is_empty() {
            stderr.trim().to_string()
        } else {
            stdout.trim().to_string()
        };
        Ok(version)
    }

    /// Run the dependency install command. A failed install aborts the run;
    /// an empty command disables the step.
    pub fn install_dependencies(&self, install_command: &[String]) -> Result<()> {
        let Some((program, args)) = install_command.split_first() else {
            return Ok(());
        };

        tracing::info!(command = %install_command.join(" "), "installing dependencies");
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.workspace_path)
            .status()
            .map_err(|e| {
                CatrunError::Setup(format!("failed to execute install command '{program}': {e}"))
            })?;

        if !status.success() {
            return Err(CatrunError::Setup(format!(
                "install command failed with exit code {}",
                status.code().unwrap_or(-1)
            )));
        }

        Ok(())
    }

    /// Execute the categorizer with output buffering disabled, the API secret
    /// injected into its environment, and a hard wall-clock timeout. The
    /// secret is never printed or logged.
    pub fn run(&self, api_key: &str) -> Result<()> {
        let mut command = Command::new(&self.config.command);
        command
            .current_dir(&self.workspace_path)
            .args(&self.config.args)
            .env(&self.config.unbuffered_env, "1")
            .env(&self.config.api_key_env, api_key)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::info!(
            command = %self.config.command,
            args = %self.config.args.join(" "),
            timeout_secs = self.config.timeout_secs,
            "starting categorizer"
        );

        let mut child = command.spawn().map_err(|e| {
            CatrunError::CategorizerExecution(format!(
                "Failed to spawn '{}': {e}",
                self.config.command
            ))
        })?;

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg} [{elapsed}]")
                .unwrap(),
        );
        pb.set_message("categorizer running");
        pb.enable_steady_tick(Duration::from_millis(120));

        // Stream subprocess output as it arrives; the categorizer reports
        // per-article progress on stdout.
        let stdout_thread = child.stdout.take().map(|stdout| {
            let pb = pb.clone();
            std::thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                    pb.println(&line);
                    tracing::info!(target: "categorizer", "{line}");
                }
            })
        });

        let stderr_thread = child.stderr.take().map(|stderr| {
            let pb = pb.clone();
            std::thread::spawn(move || {
                let mut tail: Vec<String> = Vec::new();
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    pb.println(&line);
                    tracing::warn!(target: "categorizer", "{line}");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
                tail.join("\n")
            })
        });

        let wait_result = self.wait_with_timeout(&mut child);

        // The pipes close once the child is gone, so the readers finish even
        // on the timeout path.
        if let Some(thread) = stdout_thread {
            let _ = thread.join();
        }
        let stderr_tail = stderr_thread
            .and_then(|thread| thread.join().ok())
            .unwrap_or_default();

        pb.finish_and_clear();

        let status = wait_result?;
        if !status.success() {
            let mut message = format!(
                "categorizer exited with code {}",
                status.code().unwrap_or(-1)
            );
            if !stderr_tail.is_empty() {
                message.push_str(&format!("; stderr tail:\n{stderr_tail}"));
            }
            return Err(CatrunError::CategorizerExecution(message));
        }

        tracing::info!("categorizer finished");
        Ok(())
    }

    /// Poll the child until it exits or the wall-clock deadline passes.
    /// On expiry the child is killed and the run fails; no partial-output
    /// recovery is attempted.
    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus> {
        let started = Instant::now();
        let deadline = (self.config.timeout_secs > 0)
            .then(|| Duration::from_secs(self.config.timeout_secs));

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }

            if let Some(timeout) = deadline {
                if started.elapsed() >= timeout {
                    tracing::error!(
                        timeout_secs = self.config.timeout_secs,
                        "categorizer timed out, killing subprocess"
                    );
                    // The child may exit between try_wait and kill
                    let _ = child.kill();
                    child.wait()?;
                    return Err(CatrunError::CategorizerTimeout(self.config.timeout_secs));
                }
            }

            std::thread::sleep(Duration::from_millis(200));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn agent(command: &str, args: &[&str], timeout_secs: u64, dir: &Path) -> CategorizerExecutionAgent {
        let config = CategorizerConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
            ..CategorizerConfig::default()
        };
        CategorizerExecutionAgent::new(config, dir)
    }

    #[cfg(unix)]
    #[test]
    fn successful_subprocess_passes() {
        let dir = tempdir().unwrap();
        let agent = agent("sh", &["-c", "echo categorized 3 articles"], 30, dir.path());
        agent.run("test-key").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_fails_the_run() {
        let dir = tempdir().unwrap();
        let agent = agent("sh", &["-c", "echo boom >&2; exit 3"], 30, dir.path());
        let err = agent.run("test-key").unwrap_err();
        match err {
            CatrunError::CategorizerExecution(message) => {
                assert!(message.contains("code 3"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_subprocess() {
        let dir = tempdir().unwrap();
        let agent = agent("sleep", &["30"], 1, dir.path());
        let started = Instant::now();
        let err = agent.run("test-key").unwrap_err();
        assert!(matches!(err, CatrunError::CategorizerTimeout(1)));
        // Killed at the deadline, not after sleep finished
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn secret_reaches_the_subprocess_environment() {
        let dir = tempdir().unwrap();
        let agent = agent(
            "sh",
            &["-c", "test \"$MISTRAL_API_KEY\" = sekret"],
            30,
            dir.path(),
        );
        agent.run("sekret").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn missing_runtime_is_a_setup_error() {
        let dir = tempdir().unwrap();
        let agent = agent("definitely-not-a-real-binary", &[], 30, dir.path());
        let err = agent.check_runtime().unwrap_err();
        assert!(matches!(err, CatrunError::Setup(_)));
    }

    #[cfg(unix)]
    #[test]
    fn empty_install_command_is_a_noop() {
        let dir = tempdir().unwrap();
        let agent = agent("sh", &[], 30, dir.path());
        agent.install_dependencies(&[]).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failing_install_aborts() {
        let dir = tempdir().unwrap();
        let agent = agent("sh", &[], 30, dir.path());
        let err = agent
            .install_dependencies(&["false".to_string()])
            .unwrap_err();
        assert!(matches!(err, CatrunError::Setup(_)));
    }
}
