//! Result of a successful run

use std::time::Duration;

use crate::error::ProcError;
use crate::executor::{Completion, Deadline, ExecutionOutcome, OutputSnapshot, StreamKind};

/// A process that ran to completion with an expected exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcResult {
    command: String,
    exit_code: i32,
    elapsed: Duration,
    stdout: OutputSnapshot,
    stderr: OutputSnapshot,
}

impl ProcResult {
    fn from_completion(command: String, completion: Completion) -> Self {
        Self {
            command,
            exit_code: completion.exit_code,
            elapsed: completion.elapsed,
            stdout: completion.stdout,
            stderr: completion.stderr,
        }
    }

    /// The command line that was executed
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Time from spawn to exit
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Captured stdout
    ///
    /// Fails with [`ProcError::OutputConsumed`] when stdout went to a
    /// caller-supplied stream or consumer.
    pub fn output_bytes(&self) -> Result<&[u8], ProcError> {
        snapshot_bytes(&self.stdout, StreamKind::Stdout)
    }

    /// Captured stdout as (lossy) UTF-8
    pub fn output_string(&self) -> Result<String, ProcError> {
        self.output_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Captured stderr
    pub fn error_bytes(&self) -> Result<&[u8], ProcError> {
        snapshot_bytes(&self.stderr, StreamKind::Stderr)
    }

    /// Captured stderr as (lossy) UTF-8
    pub fn error_string(&self) -> Result<String, ProcError> {
        self.error_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn stdout_snapshot(&self) -> &OutputSnapshot {
        &self.stdout
    }

    pub fn stderr_snapshot(&self) -> &OutputSnapshot {
        &self.stderr
    }
}

fn snapshot_bytes(snapshot: &OutputSnapshot, stream: StreamKind) -> Result<&[u8], ProcError> {
    snapshot
        .bytes()
        .ok_or(ProcError::OutputConsumed { stream })
}

/// Map an outcome onto the success result or one of the failure kinds
pub fn into_result(
    outcome: ExecutionOutcome,
    command: String,
    deadline: Deadline,
) -> Result<ProcResult, ProcError> {
    match outcome {
        ExecutionOutcome::Success(completion) => {
            Ok(ProcResult::from_completion(command, completion))
        }
        ExecutionOutcome::UnexpectedExitCode(completion) => Err(ProcError::ExternalFailure {
            command,
            exit_code: completion.exit_code,
            elapsed_ms: completion.elapsed.as_millis() as u64,
            stdout: completion.stdout,
            stderr: completion.stderr,
        }),
        ExecutionOutcome::TimedOut { elapsed } => {
            let elapsed_ms = elapsed.as_millis() as u64;
            Err(ProcError::Timeout {
                command,
                timeout_ms: deadline.as_millis().unwrap_or(elapsed_ms),
                elapsed_ms,
            })
        }
        ExecutionOutcome::StartupFailed(source) => Err(ProcError::Startup { command, source }),
        ExecutionOutcome::StreamFailed {
            failure,
            elapsed,
            stdout,
            stderr,
        } => Err(ProcError::StreamFailed {
            command,
            elapsed_ms: elapsed.as_millis() as u64,
            failure,
            stdout,
            stderr,
        }),
        ExecutionOutcome::WaitFailed(source) => Err(ProcError::Wait { command, source }),
    }
}
