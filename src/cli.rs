use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "catrun",
    about = "Scheduled runner that executes the article categorizer and publishes changed output via Git",
    version,
    author
)]
pub struct Cli {
    /// Path to the workspace checkout (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: String,

    /// Path to the configuration file (defaults to <workspace>/catrun.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one full run: prepare, categorize, and publish changes
    Run {
        /// Run the categorizer but skip the commit-and-push step
        #[arg(long)]
        no_publish: bool,

        /// Skip the dependency install step
        #[arg(long)]
        skip_install: bool,
    },

    /// Report artifact state and whether a run would publish, without running
    /// the categorizer
    Check,

    /// Publish the current artifact if it changed (e.g. retry after a
    /// rejected push)
    Publish,
}
