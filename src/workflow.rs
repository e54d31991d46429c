use crate::agents::{
    CategorizerExecutionAgent, PublishOutcome, VersionControlAgent, WorkspaceInfo,
    WorkspaceScannerAgent,
};
use crate::artifact;
use crate::config::RunnerConfig;
use crate::error::{CatrunError, Result};
use crate::lock::RunLock;
use crate::logging;
use colored::Colorize;
use jiff::Zoned;
use std::path::Path;

/// Execute one end-to-end run: prepare the workspace, run the categorizer,
/// and publish the artifact if it changed. Every step is a barrier; the first
/// failure aborts the run.
pub fn execute_run<P: AsRef<Path>>(
    workspace_path: P,
    config_path: Option<&Path>,
    no_publish: bool,
    skip_install: bool,
) -> Result<()> {
    let workspace_path = workspace_path.as_ref();
    println!("{}", "Starting categorization run...".cyan().bold());

    // Step 1: Validate the workspace and load configuration
    println!("\n{}", "1. Validating workspace...".yellow());
    let (info, config) = load_context(workspace_path, config_path)?;
    prepare_run(&info, &config)?;
    println!("{}", "✓ Workspace ready".green());
    tracing::info!(
        started = %Zoned::now(),
        workspace = %info.workspace_path.display(),
        "run started"
    );

    if !info.has_git && !no_publish {
        return Err(CatrunError::WorkspaceValidation(
            "no Git checkout found; use --no-publish to run without publishing".to_string(),
        ));
    }

    // Step 2: Acquire the run lock before any mutating work
    println!("\n{}", "2. Acquiring run lock...".yellow());
    let lock = RunLock::acquire(
        &info.workspace_path.join(&config.run.lock_file),
        config.run.stale_lock_secs,
    )?;
    println!("{}", "✓ Lock acquired".green());

    // Step 3: Prepare the Git repository (full history + committer identity)
    let git_agent = if no_publish {
        println!("\n{}", "3. Skipping Git preparation (--no-publish)".yellow());
        None
    } else {
        println!("\n{}", "3. Preparing Git repository...".yellow());
        let agent = VersionControlAgent::new(&info.workspace_path)?;
        agent.ensure_full_history()?;
        agent.configure_identity(&config.publish.committer_name, &config.publish.committer_email)?;
        println!("{}", "✓ Repository ready".green());
        Some(agent)
    };

    // Step 4: Provision the categorizer runtime and its dependencies
    println!("\n{}", "4. Provisioning categorizer runtime...".yellow());
    let categorizer =
        CategorizerExecutionAgent::new(config.categorizer.clone(), &info.workspace_path);
    if config.setup.check_runtime {
        let version = categorizer.check_runtime()?;
        println!("   Runtime: {}", version.bright_cyan());
    }
    if skip_install {
        println!("   {}", "Dependency install skipped (--skip-install)".dimmed());
    } else {
        categorizer.install_dependencies(&config.setup.install_command)?;
    }
    println!("{}", "✓ Runtime ready".green());

    // Step 5: Run the categorizer, with the API secret injected explicitly
    println!("\n{}", "5. Running categorizer...".yellow());
    let api_key = std::env::var(&config.categorizer.api_key_env).map_err(|_| {
        CatrunError::Config(format!(
            "{} is not set in the environment",
            config.categorizer.api_key_env
        ))
    })?;
    categorizer.run(&api_key)?;
    println!("{}", "✓ Categorizer finished".green());

    // Step 6: Inspect the output artifact
    println!("\n{}", "6. Inspecting output artifact...".yellow());
    let output_abs = info.workspace_path.join(&config.paths.output_rel());
    if config.categorizer.validate_output {
        let summary = artifact::inspect(&output_abs)?;
        println!(
            "   {} articles in {}",
            summary.article_count.to_string().bright_cyan(),
            config.paths.output_rel().dimmed()
        );
        println!("{}", "✓ Artifact is well-formed".green());
    } else {
        println!("   {}", "Output validation disabled".dimmed());
    }

    // Step 7: Publish the artifact if it changed
    if let Some(git_agent) = git_agent {
        println!("\n{}", "7. Publishing changes...".yellow());
        let outcome = git_agent.publish_if_changed(
            &config.paths.output_rel(),
            &config.publish.commit_message,
            &config.publish.remote,
            &config.publish.branch,
        )?;
        print_publish_outcome(&outcome);
    } else {
        println!("\n{}", "7. Publish skipped (--no-publish)".yellow());
    }

    lock.release()?;
    tracing::info!("run completed");
    println!("\n{}", "✨ Run completed successfully!".green().bold());
    Ok(())
}

/// Dry-run: report artifact state and whether a run would publish, without
/// executing the categorizer or touching the repository.
pub fn execute_check<P: AsRef<Path>>(workspace_path: P, config_path: Option<&Path>) -> Result<()> {
    let workspace_path = workspace_path.as_ref();
    println!("{}", "Checking workspace state...".cyan().bold());

    println!("\n{}", "1. Validating workspace...".yellow());
    let (info, config) = load_context(workspace_path, config_path)?;
    println!("{}", "✓ Workspace ready".green());

    println!("\n{}", "2. Inspecting output artifact...".yellow());
    let output_abs = info.workspace_path.join(&config.paths.output_rel());
    if output_abs.exists() {
        let summary = artifact::inspect(&output_abs)?;
        println!(
            "   {} articles in {}",
            summary.article_count.to_string().bright_cyan(),
            config.paths.output_rel().dimmed()
        );
        if let Some(timestamp) = summary.timestamp {
            println!("   Last categorization: {}", timestamp.dimmed());
        }
    } else {
        println!("   {}", "Artifact not present yet".dimmed());
    }

    println!("\n{}", "3. Computing pending changes...".yellow());
    if info.has_git {
        let git_agent = VersionControlAgent::new(&info.workspace_path)?;
        if git_agent.has_pending_changes(&config.paths.output_rel())? {
            println!("{}", "⚠ The artifact differs from HEAD: a run would publish".yellow());
        } else {
            println!("{}", "✓ Nothing pending: a run would be a no-op publish".green());
        }
    } else {
        println!("   {}", "No Git checkout, publish state unavailable".dimmed());
    }

    Ok(())
}

/// The conditional publish step alone. Used to retry after a rejected push;
/// safe to repeat because an unchanged artifact publishes nothing.
pub fn execute_publish<P: AsRef<Path>>(
    workspace_path: P,
    config_path: Option<&Path>,
) -> Result<()> {
    let workspace_path = workspace_path.as_ref();
    println!("{}", "Publishing categorized articles...".cyan().bold());

    println!("\n{}", "1. Validating workspace...".yellow());
    let (info, config) = load_context(workspace_path, config_path)?;
    if !info.has_git {
        return Err(CatrunError::WorkspaceValidation(
            "no Git checkout found; nothing to publish to".to_string(),
        ));
    }
    prepare_run(&info, &config)?;
    println!("{}", "✓ Workspace ready".green());

    println!("\n{}", "2. Acquiring run lock...".yellow());
    let lock = RunLock::acquire(
        &info.workspace_path.join(&config.run.lock_file),
        config.run.stale_lock_secs,
    )?;
    println!("{}", "✓ Lock acquired".green());

    println!("\n{}", "3. Preparing Git repository...".yellow());
    let git_agent = VersionControlAgent::new(&info.workspace_path)?;
    git_agent.ensure_full_history()?;
    git_agent.configure_identity(&config.publish.committer_name, &config.publish.committer_email)?;
    println!("{}", "✓ Repository ready".green());

    println!("\n{}", "4. Inspecting output artifact...".yellow());
    if config.categorizer.validate_output {
        let output_abs = info.workspace_path.join(&config.paths.output_rel());
        artifact::inspect(&output_abs)?;
        println!("{}", "✓ Artifact is well-formed".green());
    } else {
        println!("   {}", "Output validation disabled".dimmed());
    }

    println!("\n{}", "5. Publishing changes...".yellow());
    let outcome = git_agent.publish_if_changed(
        &config.paths.output_rel(),
        &config.publish.commit_message,
        &config.publish.remote,
        &config.publish.branch,
    )?;
    print_publish_outcome(&outcome);

    lock.release()?;
    println!("\n{}", "✨ Publish step completed!".green().bold());
    Ok(())
}

/// Shared preamble: validate the workspace, load and validate the config.
/// Read-only, so `check` can use it too.
fn load_context(
    workspace_path: &Path,
    config_path: Option<&Path>,
) -> Result<(WorkspaceInfo, RunnerConfig)> {
    let scanner = WorkspaceScannerAgent::new(workspace_path);
    let info = scanner.validate()?;

    let config = RunnerConfig::load(config_path, &info.workspace_path)?;
    for warning in config.validate()? {
        println!("{}", format!("⚠ {warning}").yellow());
    }

    Ok((info, config))
}

/// Mutating half of the preamble: create the output directories and bring up
/// the run log. Safe to repeat across runs.
fn prepare_run(info: &WorkspaceInfo, config: &RunnerConfig) -> Result<()> {
    WorkspaceScannerAgent::prepare_directories(info, &config.paths)?;
    logging::init(
        &info.workspace_path.join(&config.paths.logs_dir),
        &config.paths.log_file,
    )
}

fn print_publish_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Unchanged => {
            println!("{}", "✓ No changes detected, nothing to publish".green());
        }
        PublishOutcome::Published { head } => {
            println!("{}", format!("✓ Pushed {head}").green());
        }
    }
}
