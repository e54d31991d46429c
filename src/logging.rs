use crate::error::Result;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize the run log, appended to `logs/<log_file>` in the workspace.
///
/// Console output is handled separately by the workflow; the tracing layer
/// only writes the file, so it stays ANSI-free and greppable across runs.
/// Level resolution: RUST_LOG > CATRUN_VERBOSE > info.
pub fn init(logs_dir: &Path, log_file: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(log_file))?;

    let default_level = if std::env::var("CATRUN_VERBOSE").is_ok() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: a second subcommand invocation inside one process (tests) must
    // not panic on the already-set global subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Ok(())
}
