//! Outcome types shared by the execution machinery
//!
//! A run ends in exactly one [`ExecutionOutcome`]. Output snapshots are
//! explicit about why bytes might be missing, so a failure diagnostic never
//! shows silently empty output.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// Marker shown in diagnostics when a stream went to a caller-owned handler
pub const CONSUMED_MARKER: &str = "<already consumed by caller-owned stream>";

/// Marker shown in diagnostics when a capture was dropped after a read error
pub const DISCARDED_MARKER: &str = "<discarded after stream failure>";

/// Which of the child's standard streams a task is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdin => write!(f, "stdin"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// What is known about the bytes a stream produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSnapshot {
    /// Bytes captured into an internally owned buffer
    Captured(Vec<u8>),
    /// The stream went to a caller-supplied sink or consumer
    Consumed,
    /// Capture failed part way; partial bytes are not trusted
    Discarded,
}

impl OutputSnapshot {
    /// Captured bytes, if this stream was captured internally
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            OutputSnapshot::Captured(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Lossy UTF-8 rendering for diagnostics, with markers for missing output
    pub fn to_display_string(&self) -> String {
        match self {
            OutputSnapshot::Captured(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            OutputSnapshot::Consumed => CONSUMED_MARKER.to_string(),
            OutputSnapshot::Discarded => DISCARDED_MARKER.to_string(),
        }
    }
}

/// A failure raised while feeding or draining one stream
///
/// Cheap to clone so the same failure can travel through the event channel
/// and be returned from `join_all`.
#[derive(Debug, Clone)]
pub struct StreamFailure {
    stream: StreamKind,
    cause: Arc<dyn StdError + Send + Sync + 'static>,
}

impl StreamFailure {
    pub fn new(stream: StreamKind, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            stream,
            cause: Arc::from(cause.into()),
        }
    }

    /// Failure from a caller-supplied consumer
    pub fn from_consumer(stream: StreamKind, err: anyhow::Error) -> Self {
        Self::new(stream, Box::<dyn StdError + Send + Sync>::from(err))
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// The underlying error, as raised
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handling failed: {}", self.stream, self.cause)
    }
}

impl StdError for StreamFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

/// A process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub exit_code: i32,
    pub elapsed: Duration,
    pub stdout: OutputSnapshot,
    pub stderr: OutputSnapshot,
}

/// The single terminal result of one invocation
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Exit code was in the expected set
    Success(Completion),
    /// Exit code was outside a non-empty expected set
    UnexpectedExitCode(Completion),
    /// No terminal event before the deadline
    TimedOut { elapsed: Duration },
    /// The OS refused to spawn the process
    StartupFailed(std::io::Error),
    /// A stream task failed; the process was killed
    StreamFailed {
        failure: StreamFailure,
        elapsed: Duration,
        stdout: OutputSnapshot,
        stderr: OutputSnapshot,
    },
    /// Waiting on the child failed; the process was killed
    WaitFailed(std::io::Error),
}

impl ExecutionOutcome {
    /// Short tag used in logs and serialized reports
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success(_) => "success",
            ExecutionOutcome::UnexpectedExitCode(_) => "unexpected_exit_code",
            ExecutionOutcome::TimedOut { .. } => "timed_out",
            ExecutionOutcome::StartupFailed(_) => "startup_failed",
            ExecutionOutcome::StreamFailed { .. } => "stream_failed",
            ExecutionOutcome::WaitFailed(_) => "wait_failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    /// Exit code, when the process ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionOutcome::Success(c) | ExecutionOutcome::UnexpectedExitCode(c) => {
                Some(c.exit_code)
            }
            _ => None,
        }
    }
}
