//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run external processes with deadlines, concurrent stream draining and
/// exit-code checking.
#[derive(Parser, Debug)]
#[command(name = "procrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command
    Run(RunArgs),

    /// Run a profile from the configuration
    Profile(ProfileArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Timeout in milliseconds (0 for no timeout)
    #[arg(short, long, conflicts_with = "no_timeout")]
    pub timeout: Option<u64>,

    /// Let the command run without a deadline
    #[arg(long)]
    pub no_timeout: bool,

    /// Exit code treated as success (repeatable)
    #[arg(short = 'e', long = "expect", allow_negative_numbers = true)]
    pub expect: Vec<i32>,

    /// Accept any exit code
    #[arg(long, conflicts_with = "expect")]
    pub any_exit: bool,

    /// Environment variables in KEY=VALUE format
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Start from an empty environment
    #[arg(long)]
    pub clear_env: bool,

    /// Working directory
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Text to send on stdin
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// File to send on stdin
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Don't capture output, stream directly
    #[arg(long)]
    pub stream: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Command to run
    #[arg(required = true)]
    pub command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Parse KEY=VALUE argument
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid argument '{}': expected KEY=VALUE format", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Arguments for the `profile` subcommand
#[derive(Parser, Debug)]
pub struct ProfileArgs {
    /// Profile name
    #[arg(required = true)]
    pub name: String,

    /// Don't capture output, stream directly
    #[arg(long)]
    pub stream: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// List the config files that were found instead
    #[arg(long)]
    pub paths: bool,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Table,
    /// JSON output
    Json,
    /// Raw process output only
    Plain,
}
