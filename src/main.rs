//! procrun CLI entry point
//!
//! Usage:
//!   procrun run [OPTIONS] -- <command> [args...]   Run a command
//!   procrun profile <name>                         Run a configured profile
//!   procrun config                                 Show configuration

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use procrun::cli::{Cli, Commands, ConfigArgs, OutputFormat, ProfileArgs, RunArgs};
use procrun::config::{find_config_files, load_config, Config};
use procrun::error::{ErrorInfo, ProcError};
use procrun::logging::init_logging;
use procrun::proc::{format_command_line, ProcBuilder, ProcResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{}: {:#}", "warning".yellow().bold(), e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run(args) => run_command(args, config_path).await,
        Commands::Profile(args) => run_profile(args, config_path).await,
        Commands::Config(args) => {
            show_config(args, config_path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run an ad-hoc command line
async fn run_command(args: RunArgs, config_path: Option<&str>) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    let mut builder = ProcBuilder::new(&args.command)
        .with_args(args.args.iter().cloned())
        .with_vars(config.env.clone())
        .with_vars(args.env.iter().cloned());

    builder = if args.no_timeout {
        builder.with_no_timeout()
    } else {
        builder.with_deadline(config.defaults.deadline())
    };
    if let Some(ms) = args.timeout {
        builder = builder.with_timeout_millis(ms);
    }

    builder = if args.any_exit {
        builder.ignore_exit_status()
    } else if !args.expect.is_empty() {
        builder.with_expected_exit_statuses(args.expect.iter().copied())
    } else {
        builder.with_expected_exit_statuses(config.defaults.expected().codes())
    };

    if args.clear_env || config.defaults.clear_env {
        builder = builder.clear_environment();
    }
    if let Some(ref dir) = args.dir {
        builder = builder.with_working_directory(dir);
    }

    if let Some(ref input) = args.input {
        builder = builder.with_input(input.as_str());
    } else if let Some(ref path) = args.input_file {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open input file '{}'", path.display()))?;
        builder = builder.with_input_stream(file);
    }

    execute_and_report(builder, args.stream, &args.format).await
}

/// Run a profile from the configuration
async fn run_profile(args: ProfileArgs, config_path: Option<&str>) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    let profile = config.get_profile(&args.name).with_context(|| {
        let known = config.list_profiles();
        if known.is_empty() {
            format!("Profile '{}' not found. No profiles are configured.", args.name)
        } else {
            format!(
                "Profile '{}' not found. Configured profiles: {}",
                args.name,
                known.join(", ")
            )
        }
    })?;

    tracing::debug!(profile = %profile.name, "running profile");
    execute_and_report(profile.to_builder(), args.stream, &args.format).await
}

async fn execute_and_report(
    mut builder: ProcBuilder,
    stream: bool,
    format: &OutputFormat,
) -> Result<ExitCode> {
    if stream {
        builder = builder
            .with_output_stream(tokio::io::stdout())
            .with_error_stream(tokio::io::stderr());
    }

    match builder.run().await {
        Ok(result) => {
            report_success(&result, format)?;
            Ok(mirror_exit_code(result.exit_code()))
        }
        Err(err) => {
            report_failure(&err, format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report_success(result: &ProcResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "command": result.command(),
                "exit_code": result.exit_code(),
                "elapsed_ms": result.elapsed_ms(),
                "stdout": result.stdout_snapshot().to_display_string(),
                "stderr": result.stderr_snapshot().to_display_string(),
            }))?;
            println!("{}", json);
        }
        OutputFormat::Plain => {
            write_captured(result)?;
        }
        OutputFormat::Table => {
            write_captured(result)?;
            eprintln!(
                "{}: '{}' exited {} in {}ms",
                "done".green(),
                result.command(),
                result.exit_code(),
                result.elapsed_ms()
            );
        }
    }
    Ok(())
}

/// Copy captured output to our own stdout/stderr; streamed output is already there
fn write_captured(result: &ProcResult) -> Result<()> {
    if let Some(bytes) = result.stdout_snapshot().bytes() {
        let mut out = std::io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
    }
    if let Some(bytes) = result.stderr_snapshot().bytes() {
        let mut err = std::io::stderr().lock();
        err.write_all(bytes)?;
        err.flush()?;
    }
    Ok(())
}

fn report_failure(err: &ProcError, format: &OutputFormat) -> Result<()> {
    let info = ErrorInfo::from(err);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Plain | OutputFormat::Table => {
            if let Some(bytes) = err.stdout().and_then(|s| s.bytes()) {
                let mut out = std::io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()?;
            }
            eprintln!("{}: {}", "error".red().bold(), err);
            if let Some(ref suggestion) = info.suggestion {
                eprintln!("{}: {}", "hint".yellow(), suggestion);
            }
        }
    }
    Ok(())
}

/// Exit with the child's code, or 1 when it does not fit in a process exit status
fn mirror_exit_code(code: i32) -> ExitCode {
    u8::try_from(code)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}

/// Show resolved configuration
fn show_config(args: ConfigArgs, config_path: Option<&str>) -> Result<()> {
    if args.paths {
        let files = find_config_files();
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
            _ => {
                for file in &files {
                    println!("{}", file.display());
                }
            }
        }
        return Ok(());
    }

    let config = load_config(config_path)?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Plain => {
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to render configuration")?
            );
        }
        OutputFormat::Table => print_config_table(&config),
    }

    Ok(())
}

fn print_config_table(config: &Config) {
    let timeout = match config.defaults.timeout_ms {
        0 => "none".to_string(),
        ms => format!("{}ms", ms),
    };
    let expected = config.defaults.expected();
    let expected = if expected.accepts_any() {
        "any".to_string()
    } else {
        expected
            .codes()
            .map(|code| code.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("{}: {}", "Timeout".cyan(), timeout);
    println!("{}: {}", "Expected Exit Codes".cyan(), expected);
    println!("{}: {}", "Clear Environment".cyan(), config.defaults.clear_env);

    if !config.env.is_empty() {
        println!();
        println!("{}:", "Environment".cyan());
        let mut keys: Vec<_> = config.env.keys().collect();
        keys.sort();
        for key in keys {
            println!("  {}={}", key, config.env[key]);
        }
    }

    println!();
    println!("{}:", "Profiles".cyan());
    let names = config.list_profiles();
    if names.is_empty() {
        println!("  None");
        return;
    }

    let width = names.iter().map(String::len).max().unwrap_or(10);
    for name in &names {
        if let Some(profile) = config.get_profile(name) {
            println!(
                "  {:width$}  {}",
                name.green(),
                format_command_line(&profile.command, &profile.args),
                width = width
            );
        }
    }
}
