//! CLI module for procrun
//!
//! Provides command-line interface with the following subcommands:
//! - `run` - Run a command
//! - `profile` - Run a named profile from the configuration
//! - `config` - Show configuration

pub mod commands;

pub use commands::{Cli, Commands, ConfigArgs, OutputFormat, ProfileArgs, RunArgs};
