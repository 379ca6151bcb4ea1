//! Error types for procrun
//!
//! Provides structured error types with suggestions for common issues.

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::executor::{OutputSnapshot, StreamFailure, StreamKind};

/// Main error type for process runs
#[derive(Error, Debug)]
pub enum ProcError {
    /// The process could not be spawned
    #[error("Could not start process '{command}': {source}")]
    Startup {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The deadline elapsed before the process finished
    #[error("Process '{command}' timed out after {timeout_ms}ms.")]
    Timeout {
        command: String,
        timeout_ms: u64,
        elapsed_ms: u64,
    },

    /// Feeding or draining a stream failed; the process was killed
    #[error("Process '{command}' aborted after {elapsed_ms}ms: {failure}")]
    StreamFailed {
        command: String,
        elapsed_ms: u64,
        #[source]
        failure: StreamFailure,
        stdout: OutputSnapshot,
        stderr: OutputSnapshot,
    },

    /// The process finished with an exit code outside the expected set
    #[error(
        "External process '{command}' returned {exit_code} after {elapsed_ms}ms\n{}",
        .stderr.to_display_string()
    )]
    ExternalFailure {
        command: String,
        exit_code: i32,
        elapsed_ms: u64,
        stdout: OutputSnapshot,
        stderr: OutputSnapshot,
    },

    /// Waiting for the process failed; the process was killed
    #[error("Waiting for process '{command}' failed: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A result accessor was asked for output that went to a caller-owned stream
    #[error("Output on {stream} has been consumed by a caller-provided stream")]
    OutputConsumed { stream: StreamKind },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcError {
    /// Command line of the failed run, when the error belongs to one
    pub fn command(&self) -> Option<&str> {
        match self {
            ProcError::Startup { command, .. }
            | ProcError::Timeout { command, .. }
            | ProcError::StreamFailed { command, .. }
            | ProcError::ExternalFailure { command, .. }
            | ProcError::Wait { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Exit code, for runs that completed with an unexpected code
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcError::ExternalFailure { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Stdout snapshot carried by stream and exit-code failures
    pub fn stdout(&self) -> Option<&OutputSnapshot> {
        match self {
            ProcError::StreamFailed { stdout, .. } | ProcError::ExternalFailure { stdout, .. } => {
                Some(stdout)
            }
            _ => None,
        }
    }

    /// Stderr snapshot carried by stream and exit-code failures
    pub fn stderr(&self) -> Option<&OutputSnapshot> {
        match self {
            ProcError::StreamFailed { stderr, .. } | ProcError::ExternalFailure { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

/// Serializable error info for JSON reports
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&ProcError> for ErrorInfo {
    fn from(err: &ProcError) -> Self {
        let mut info = ErrorInfo {
            message: err.to_string(),
            error_type: String::new(),
            command: err.command().map(str::to_string),
            suggestion: None,
            exit_code: err.exit_code(),
            elapsed_ms: None,
            stdout: err.stdout().map(OutputSnapshot::to_display_string),
            stderr: err.stderr().map(OutputSnapshot::to_display_string),
        };

        match err {
            ProcError::Startup { command, source } => {
                info.error_type = "startup_failed".to_string();
                info.suggestion = startup_suggestion(command, source);
            }
            ProcError::Timeout { elapsed_ms, .. } => {
                info.error_type = "timeout".to_string();
                info.elapsed_ms = Some(*elapsed_ms);
                info.suggestion = Some(
                    "Try increasing the timeout or checking if the command hangs".to_string(),
                );
            }
            ProcError::StreamFailed { elapsed_ms, .. } => {
                info.error_type = "stream_failed".to_string();
                info.elapsed_ms = Some(*elapsed_ms);
            }
            ProcError::ExternalFailure {
                command,
                elapsed_ms,
                stderr,
                ..
            } => {
                info.error_type = "unexpected_exit_code".to_string();
                info.elapsed_ms = Some(*elapsed_ms);
                info.suggestion = stderr
                    .bytes()
                    .and_then(|b| suggest_fix(command, &String::from_utf8_lossy(b)));
            }
            ProcError::Wait { .. } => {
                info.error_type = "wait_failed".to_string();
            }
            ProcError::OutputConsumed { .. } => {
                info.error_type = "output_consumed".to_string();
                info.suggestion = Some(
                    "Read the output from the stream or consumer you supplied".to_string(),
                );
            }
            ProcError::Config(_) => {
                info.error_type = "config_error".to_string();
                info.suggestion = Some("Check your procrun configuration file".to_string());
            }
            ProcError::Io(_) => {
                info.error_type = "io_error".to_string();
            }
        }

        info
    }
}

/// Suggest a fix for a process that could not be spawned
pub fn startup_suggestion(command: &str, error: &io::Error) -> Option<String> {
    let program = command.split_whitespace().next().unwrap_or(command);

    match error.kind() {
        io::ErrorKind::NotFound => {
            if program.contains('/') || which::which(program).is_ok() {
                Some("Check that the working directory exists".to_string())
            } else {
                Some(format!("'{}' was not found in PATH", program))
            }
        }
        io::ErrorKind::PermissionDenied => Some(format!(
            "'{}' is not executable. Check file permissions.",
            program
        )),
        _ => None,
    }
}

/// Suggest fixes for common error patterns in stderr
pub fn suggest_fix(command: &str, stderr: &str) -> Option<String> {
    // Permission errors
    if stderr.contains("Permission denied") {
        return Some(
            "Permission denied. Check file permissions or run with appropriate access.".to_string(),
        );
    }

    // Command not found inside a shell
    if stderr.contains("command not found") || stderr.contains("not found") {
        return Some("Required command not found. Check PATH and dependencies.".to_string());
    }

    // File not found
    if stderr.contains("No such file") {
        return Some(format!(
            "'{}' referenced a missing file. Check the paths and working directory.",
            command
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error() {
        let err = ProcError::Startup {
            command: "nonexistent_command_12345".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(err.to_string().starts_with("Could not start process"));

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "startup_failed");
        assert!(info.suggestion.unwrap().contains("not found in PATH"));
    }

    #[test]
    fn test_timeout_error() {
        let err = ProcError::Timeout {
            command: "sleep 2".to_string(),
            timeout_ms: 1000,
            elapsed_ms: 1001,
        };
        assert_eq!(err.to_string(), "Process 'sleep 2' timed out after 1000ms.");

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "timeout");
        assert_eq!(info.elapsed_ms, Some(1001));
    }

    #[test]
    fn test_external_failure_message_includes_stderr() {
        let err = ProcError::ExternalFailure {
            command: "ls xyz".to_string(),
            exit_code: 2,
            elapsed_ms: 12,
            stdout: OutputSnapshot::Captured(vec![]),
            stderr: OutputSnapshot::Captured(b"ls: xyz: No such file or directory\n".to_vec()),
        };
        let message = err.to_string();
        assert!(message.starts_with("External process 'ls xyz' returned 2 after 12ms\n"));
        assert!(message.contains("No such file or directory"));
        assert_eq!(err.exit_code(), Some(2));

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "unexpected_exit_code");
        assert!(info.suggestion.is_some());
    }

    #[test]
    fn test_external_failure_marks_consumed_stderr() {
        let err = ProcError::ExternalFailure {
            command: "false".to_string(),
            exit_code: 1,
            elapsed_ms: 3,
            stdout: OutputSnapshot::Consumed,
            stderr: OutputSnapshot::Consumed,
        };
        assert!(err
            .to_string()
            .contains(crate::executor::outcome::CONSUMED_MARKER));

        let info = ErrorInfo::from(&err);
        assert!(info.suggestion.is_none());
        assert_eq!(
            info.stdout.as_deref(),
            Some(crate::executor::outcome::CONSUMED_MARKER)
        );
    }

    #[test]
    fn test_stream_failed_keeps_cause() {
        let failure = StreamFailure::new(StreamKind::Stdout, "callback threw");
        let err = ProcError::StreamFailed {
            command: "echo hi".to_string(),
            elapsed_ms: 5,
            failure,
            stdout: OutputSnapshot::Consumed,
            stderr: OutputSnapshot::Captured(b"partial".to_vec()),
        };
        assert!(err.to_string().contains("callback threw"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(ErrorInfo::from(&err).stderr.as_deref(), Some("partial"));
    }

    #[test]
    fn test_suggest_fix_permission_denied() {
        let suggestion = suggest_fix("./run.sh build", "Permission denied");
        assert!(suggestion.unwrap().contains("Permission"));
    }

    #[test]
    fn test_suggest_fix_no_match() {
        assert!(suggest_fix("some command", "some random error").is_none());
    }

    #[test]
    fn test_error_info_skips_empty_fields() {
        let info = ErrorInfo::from(&ProcError::Config("bad".to_string()));

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("config_error"));
        assert!(!json.contains("exit_code"));
        assert!(!json.contains("stderr"));
        assert!(!json.contains("command"));
    }
}
