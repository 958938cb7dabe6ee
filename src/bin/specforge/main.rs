//! specforge CLI - inspect build tool specs and the tasks they produce

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use specforge::ops::LoadOptions;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Global state every command shares.
pub struct GlobalArgs {
    pub color: bool,
    pub load: LoadOptions,
}

/// Returns whether the command succeeded.
fn run() -> Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("specforge=debug")
    } else {
        EnvFilter::new("specforge=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalArgs {
        color: !cli.no_color && std::io::stderr().is_terminal(),
        load: LoadOptions {
            spec_paths: cli.spec_paths,
            project_root: std::env::current_dir().context("failed to get current directory")?,
            ignore_global_config: false,
        },
    };

    match cli.command {
        Commands::List(args) => commands::list::execute(args, &global),
        Commands::Show(args) => commands::show::execute(args, &global),
        Commands::Check(args) => commands::check::execute(args, &global),
        Commands::Args(args) => commands::args::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
