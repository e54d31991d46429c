mod agents;
mod artifact;
mod cli;
mod config;
mod error;
mod lock;
mod logging;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        unsafe {
            std::env::set_var("CATRUN_VERBOSE", "1");
        }
    }

    let result = match cli.command {
        Commands::Run {
            no_publish,
            skip_install,
        } => workflow::execute_run(&cli.path, cli.config.as_deref(), no_publish, skip_install),
        Commands::Check => workflow::execute_check(&cli.path, cli.config.as_deref()),
        Commands::Publish => workflow::execute_publish(&cli.path, cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
