//! Fluent configuration of a single run
//!
//! A [`ProcBuilder`] is consumed by `run`, so every invocation starts from
//! fresh state and nothing carries over between runs.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ProcError;
use crate::executor::{
    execute, Deadline, ExecutionOutcome, ExpectedExitCodes, InputSource, Invocation, LaunchSpec,
    StreamConsumer, Strategy,
};

use super::result::{into_result, ProcResult};

/// Timeout applied unless the caller chooses another one
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Builder for one process invocation
#[derive(Debug)]
pub struct ProcBuilder {
    spec: LaunchSpec,
    input: Option<InputSource>,
    stdout: Option<Strategy>,
    stderr: Option<Strategy>,
    deadline: Deadline,
    expected: ExpectedExitCodes,
}

impl ProcBuilder {
    /// Create a builder for `command` with the default 5s timeout
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            spec: LaunchSpec::new(command),
            input: None,
            stdout: None,
            stderr: None,
            deadline: Deadline::from_millis(DEFAULT_TIMEOUT_MS),
            expected: ExpectedExitCodes::default(),
        }
    }

    /// Add another argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a variable to the process environment
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    /// Add several variables to the process environment
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.spec
            .env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Start from an empty environment; only variables set here are passed
    pub fn clear_environment(mut self) -> Self {
        self.spec.clear_env = true;
        self
    }

    /// Override the working directory
    ///
    /// A path that is not a directory makes the run fail at startup.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    /// Supply stdin as bytes (or a string)
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(InputSource::Bytes(input.into()));
        self
    }

    /// Take stdin from a reader, copied until it ends
    pub fn with_input_stream(mut self, input: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.input = Some(InputSource::Stream(Box::new(input)));
        self
    }

    /// Copy stdout to `sink` instead of capturing it
    pub fn with_output_stream(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Strategy::sink(sink));
        self
    }

    /// Hand stdout to `consumer` instead of capturing it
    pub fn with_output_consumer(mut self, consumer: impl StreamConsumer) -> Self {
        self.stdout = Some(Strategy::consumer(consumer));
        self
    }

    /// Copy stderr to `sink` instead of capturing it
    pub fn with_error_stream(mut self, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Strategy::sink(sink));
        self
    }

    /// Hand stderr to `consumer` instead of capturing it
    pub fn with_error_consumer(mut self, consumer: impl StreamConsumer) -> Self {
        self.stderr = Some(Strategy::consumer(consumer));
        self
    }

    pub fn with_timeout_millis(mut self, millis: u64) -> Self {
        self.deadline = Deadline::from_millis(millis);
        self
    }

    /// A zero duration means no timeout, like `with_timeout_millis(0)`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Deadline::from_duration(timeout);
        self
    }

    /// Let the process run as long as it needs
    pub fn with_no_timeout(mut self) -> Self {
        self.deadline = Deadline::Unbounded;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Exit codes that count as success (an empty list accepts any code)
    pub fn with_expected_exit_statuses(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expected = ExpectedExitCodes::new(codes);
        self
    }

    /// Accept any exit code
    pub fn ignore_exit_status(mut self) -> Self {
        self.expected = ExpectedExitCodes::any();
        self
    }

    /// The command line this builder will run, for display
    pub fn command_line(&self) -> String {
        self.spec.command_line()
    }

    pub fn into_invocation(self) -> Invocation {
        Invocation {
            launch: self.spec,
            input: self.input,
            stdout: self.stdout,
            stderr: self.stderr,
            deadline: self.deadline,
            expected: self.expected,
        }
    }

    /// Run and return the raw outcome
    pub async fn execute(self) -> ExecutionOutcome {
        execute(self.into_invocation()).await
    }

    /// Run the process and wait for it to terminate
    ///
    /// # Errors
    /// * `ProcError::Startup` - the process could not be spawned
    /// * `ProcError::Timeout` - the deadline elapsed; the process was killed
    /// * `ProcError::StreamFailed` - a stream handler failed; the process was killed
    /// * `ProcError::ExternalFailure` - the exit code was not expected
    pub async fn run(self) -> Result<ProcResult, ProcError> {
        let command = self.command_line();
        let deadline = self.deadline;

        tracing::debug!("Executing: {}", command);
        let outcome = self.execute().await;
        tracing::debug!(command = %command, outcome = outcome.kind(), "run finished");

        into_result(outcome, command, deadline)
    }

    /// Blocking wrapper around [`ProcBuilder::run`] for non-async code
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn run_blocking(self) -> Result<ProcResult, ProcError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ProcError::Io(std::io::Error::other(format!(
                    "Failed to create runtime: {}",
                    e
                )))
            })?;

        rt.block_on(self.run())
    }
}

/// Run a command and return its stdout
pub async fn run<I, S>(command: &str, args: I) -> Result<String, ProcError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ProcBuilder::new(command)
        .with_args(args)
        .run()
        .await?
        .output_string()
}

/// Filter `input` through a command and return its stdout
pub async fn filter<I, S>(input: &str, command: &str, args: I) -> Result<String, ProcError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ProcBuilder::new(command)
        .with_args(args)
        .with_input(input)
        .run()
        .await?
        .output_string()
}
