//! Owns the three consumption tasks of one process
//!
//! All three tasks are started together, before anything waits on the
//! process, so a child that fills one pipe never stalls on the parent.

use tokio::io::AsyncWrite;
use tokio::process::{ChildStderr, ChildStdin, ChildStdout};

use super::controller::EventSender;
use super::outcome::{OutputSnapshot, StreamFailure, StreamKind};
use super::task::{ConsumptionTask, ProcessStream, Strategy, StreamSink};

/// Where the child's stdin comes from
pub enum InputSource {
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Any async reader, copied until end of input
    Stream(ProcessStream),
}

impl InputSource {
    fn into_stream(self) -> ProcessStream {
        match self {
            InputSource::Bytes(bytes) => Box::new(std::io::Cursor::new(bytes)),
            InputSource::Stream(stream) => stream,
        }
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            InputSource::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// The child's three pipe ends, type-erased
pub struct IoPipes {
    pub stdin: StreamSink,
    pub stdout: ProcessStream,
    pub stderr: ProcessStream,
}

impl IoPipes {
    pub fn from_child(stdin: ChildStdin, stdout: ChildStdout, stderr: ChildStderr) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    pub fn new(
        stdin: impl AsyncWrite + Send + Unpin + 'static,
        stdout: ProcessStream,
        stderr: ProcessStream,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout,
            stderr,
        }
    }
}

/// Stdin feeder plus stdout and stderr drainers, managed as a unit
#[derive(Debug)]
pub struct IoCoordinator {
    stdin: ConsumptionTask,
    stdout: ConsumptionTask,
    stderr: ConsumptionTask,
}

impl IoCoordinator {
    /// Start all three tasks
    ///
    /// Output strategies default to capturing. The stdin feeder copies
    /// `input` into the child and closes the pipe afterwards; without input
    /// it closes the pipe immediately.
    pub fn start(
        pipes: IoPipes,
        input: Option<InputSource>,
        stdout: Option<Strategy>,
        stderr: Option<Strategy>,
        events: EventSender,
    ) -> Self {
        let IoPipes {
            stdin: stdin_pipe,
            stdout: stdout_pipe,
            stderr: stderr_pipe,
        } = pipes;

        let stdin = ConsumptionTask::start(
            StreamKind::Stdin,
            input.map(InputSource::into_stream),
            Strategy::CopyToSink {
                sink: stdin_pipe,
                close: true,
            },
            events.clone(),
        );
        let stdout = ConsumptionTask::start(
            StreamKind::Stdout,
            Some(stdout_pipe),
            stdout.unwrap_or(Strategy::CaptureToBuffer),
            events.clone(),
        );
        let stderr = ConsumptionTask::start(
            StreamKind::Stderr,
            Some(stderr_pipe),
            stderr.unwrap_or(Strategy::CaptureToBuffer),
            events,
        );

        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    /// Wait for all tasks and return every failure they reported
    pub async fn join_all(&mut self) -> Vec<StreamFailure> {
        let mut failures = Vec::new();
        for task in self.tasks_mut() {
            task.join().await;
            if let Some(failure) = task.report().and_then(|r| r.failure.clone()) {
                failures.push(failure);
            }
        }
        failures
    }

    /// Interrupt all tasks and wait until they have stopped
    ///
    /// Only used on abort paths; the process must already be dead.
    pub async fn cancel_all(&mut self) {
        for task in self.tasks_mut() {
            task.cancel();
        }
        for task in self.tasks_mut() {
            task.join().await;
        }
        tracing::debug!("consumption tasks cancelled");
    }

    pub fn all_finished(&self) -> bool {
        self.stdin.is_finished() && self.stdout.is_finished() && self.stderr.is_finished()
    }

    /// Stdout and stderr snapshots from the joined tasks
    pub fn into_snapshots(self) -> (OutputSnapshot, OutputSnapshot) {
        (snapshot_of(self.stdout), snapshot_of(self.stderr))
    }

    fn tasks_mut(&mut self) -> [&mut ConsumptionTask; 3] {
        [&mut self.stdout, &mut self.stderr, &mut self.stdin]
    }
}

fn snapshot_of(task: ConsumptionTask) -> OutputSnapshot {
    task.into_report()
        .map(|r| r.snapshot)
        .unwrap_or(OutputSnapshot::Discarded)
}
