//! Process spawning
//!
//! Turns a [`LaunchSpec`] into a running child with all three standard
//! streams piped. Any refusal by the OS (missing binary, permissions, bad
//! working directory) surfaces as an `io::Error` that the controller reports
//! as a startup failure.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;

use crate::proc::format_command_line;

/// Everything needed to spawn the process
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    /// Program to execute
    pub command: String,
    /// Ordered argument list
    pub args: Vec<String>,
    /// Variables applied on top of the (possibly cleared) environment
    pub env: HashMap<String, String>,
    /// Start from an empty environment instead of the inherited one
    pub clear_env: bool,
    /// Working directory (None = inherit)
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Human-readable command line for diagnostics
    pub fn command_line(&self) -> String {
        format_command_line(&self.command, &self.args)
    }
}

/// A freshly spawned child and its raw pipe handles
#[derive(Debug)]
pub struct LaunchedProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    /// Taken immediately before spawning; deadlines and elapsed time count from here
    pub started: Instant,
}

/// Spawn the process described by `spec`
pub fn launch(spec: &LaunchSpec) -> io::Result<LaunchedProcess> {
    if let Some(ref dir) = spec.working_dir {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("working directory '{}' is not a directory", dir.display()),
            ));
        }
    }

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    if let Some(ref dir) = spec.working_dir {
        cmd.current_dir(dir);
    }

    if spec.clear_env {
        cmd.env_clear();
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    tracing::debug!(command = %spec.command_line(), "spawning process");

    let started = Instant::now();
    let mut child = cmd.spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    tracing::debug!(pid = ?child.id(), "process spawned");

    Ok(LaunchedProcess {
        child,
        stdin,
        stdout,
        stderr,
        started,
    })
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::other(format!("child {} was not piped", name))
}
