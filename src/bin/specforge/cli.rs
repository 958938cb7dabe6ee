//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// specforge - inspect build tool specs and the tasks they produce
#[derive(Parser)]
#[command(name = "specforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Additional spec directory (repeatable)
    #[arg(
        long = "spec-path",
        global = true,
        env = "SPECFORGE_SPEC_PATH",
        value_delimiter = ':'
    )]
    pub spec_paths: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List loaded specs
    List(ListArgs),

    /// Show a spec and its flattened build options
    Show(ShowArgs),

    /// Load every spec and report problems
    Check(CheckArgs),

    /// Construct the task a tool produces and print its command line
    Args(ArgsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Spec types accepted by `--type`.
#[derive(Clone, Copy, ValueEnum)]
pub enum SpecTypeArg {
    Tool,
    Compiler,
    Linker,
    BuildSystem,
    FileType,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only specs visible from this domain
    #[arg(long)]
    pub domain: Option<String>,

    /// Only specs of this type
    #[arg(long = "type", value_enum)]
    pub ty: Option<SpecTypeArg>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Spec identifier
    pub identifier: String,

    /// Domain to look the spec up in
    #[arg(long, default_value = "")]
    pub domain: String,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Also report BasedOn references into domains that are not included
    #[arg(long)]
    pub domain_inversion: bool,
}

#[derive(Args)]
pub struct ArgsArgs {
    /// Tool spec identifier
    pub tool: String,

    /// Domain to look the tool up in
    #[arg(long, default_value = "")]
    pub domain: String,

    /// Input file (repeatable)
    #[arg(long = "input", short = 'i', required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file proposed to the tool
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// TOML file of setting values
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Bind a setting (NAME=VALUE, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Current architecture
    #[arg(long)]
    pub arch: Option<String>,

    /// Tool version for version-gated options
    #[arg(long)]
    pub tool_version: Option<String>,

    /// Tool features file for feature-gated options
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
