//! Exit code classification

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::outcome::{Completion, ExecutionOutcome, OutputSnapshot};

/// Exit codes treated as non-failing
///
/// Defaults to `{0}`. An empty set accepts every exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedExitCodes(BTreeSet<i32>);

impl Default for ExpectedExitCodes {
    fn default() -> Self {
        Self::new([0])
    }
}

impl ExpectedExitCodes {
    pub fn new(codes: impl IntoIterator<Item = i32>) -> Self {
        Self(codes.into_iter().collect())
    }

    /// Accept any exit code
    pub fn any() -> Self {
        Self(BTreeSet::new())
    }

    pub fn accepts(&self, code: i32) -> bool {
        self.0.is_empty() || self.0.contains(&code)
    }

    pub fn accepts_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

/// Turn a finished process into `Success` or `UnexpectedExitCode`
///
/// Snapshots are passed through untouched: streams that went to a
/// caller-owned sink stay marked as consumed rather than re-buffered.
pub fn classify(
    exit_code: i32,
    elapsed: Duration,
    stdout: OutputSnapshot,
    stderr: OutputSnapshot,
    expected: &ExpectedExitCodes,
) -> ExecutionOutcome {
    let completion = Completion {
        exit_code,
        elapsed,
        stdout,
        stderr,
    };

    if expected.accepts(exit_code) {
        ExecutionOutcome::Success(completion)
    } else {
        tracing::debug!(exit_code, "exit code outside expected set");
        ExecutionOutcome::UnexpectedExitCode(completion)
    }
}
