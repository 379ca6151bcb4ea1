//! Execution control loop
//!
//! One invocation runs through `Running -> Deciding -> {Completed, TimedOut,
//! Aborted}`. A waiter task blocks on the child and publishes
//! `ProcessExited`; consumption tasks publish `StreamFailure`. The controller
//! takes the first event (or the deadline) from a single unbounded channel and
//! decides the outcome exactly once. Only the controller kills the process or
//! cancels tasks, and it always kills first.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::classify::{classify, ExpectedExitCodes};
use super::coordinator::{InputSource, IoCoordinator, IoPipes};
use super::launcher::{launch, LaunchSpec, LaunchedProcess};
use super::outcome::{ExecutionOutcome, StreamFailure};
use super::task::Strategy;

/// Events racing inside the controller
#[derive(Debug)]
pub enum ExecutionEvent {
    /// The waiter observed the child exiting
    ProcessExited(i32),
    /// A consumption task failed
    StreamFailure(StreamFailure),
    /// The waiter's `wait()` itself failed
    WaitFailed(io::Error),
}

/// Producer side of the event channel; never blocks
pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Wall-clock limit for the whole invocation, measured from spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
    #[default]
    Unbounded,
    After(Duration),
}

impl Deadline {
    /// `0` means no deadline
    pub fn from_millis(millis: u64) -> Self {
        match millis {
            0 => Deadline::Unbounded,
            ms => Deadline::After(Duration::from_millis(ms)),
        }
    }

    /// A zero duration means no deadline
    pub fn from_duration(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Deadline::Unbounded
        } else {
            Deadline::After(timeout)
        }
    }

    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Deadline::Unbounded => None,
            Deadline::After(d) => Some(d.as_millis() as u64),
        }
    }

    fn instant_from(&self, started: Instant) -> Option<Instant> {
        match self {
            Deadline::Unbounded => None,
            Deadline::After(d) => Some(started + *d),
        }
    }
}

/// Controller state; the last three are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Deciding,
    Completed,
    TimedOut,
    Aborted,
}

/// Fresh, self-contained state for one run
#[derive(Debug, Default)]
pub struct Invocation {
    pub launch: LaunchSpec,
    pub input: Option<InputSource>,
    /// `None` captures stdout
    pub stdout: Option<Strategy>,
    /// `None` captures stderr
    pub stderr: Option<Strategy>,
    pub deadline: Deadline,
    pub expected: ExpectedExitCodes,
}

/// Launch the process and drive it to a single outcome
pub async fn execute(invocation: Invocation) -> ExecutionOutcome {
    let Invocation {
        launch: spec,
        input,
        stdout,
        stderr,
        deadline,
        expected,
    } = invocation;

    let LaunchedProcess {
        child,
        stdin: stdin_pipe,
        stdout: stdout_pipe,
        stderr: stderr_pipe,
        started,
    } = match launch(&spec) {
        Ok(process) => process,
        Err(e) => {
            tracing::warn!(command = %spec.command_line(), error = %e, "process failed to start");
            return ExecutionOutcome::StartupFailed(e);
        }
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    // Drainers first, then the waiter: no stream is left unread while the
    // child runs.
    let coordinator = IoCoordinator::start(
        IoPipes::from_child(stdin_pipe, stdout_pipe, stderr_pipe),
        input,
        stdout,
        stderr,
        events_tx.clone(),
    );
    let waiter = Waiter::start(child, events_tx);

    let controller = ExecutionController {
        state: ControllerState::Running,
        events: events_rx,
        coordinator,
        waiter,
        started,
        deadline_at: deadline.instant_from(started),
        expected,
    };
    controller.run().await
}

struct ExecutionController {
    state: ControllerState,
    events: mpsc::UnboundedReceiver<ExecutionEvent>,
    coordinator: IoCoordinator,
    waiter: Waiter,
    started: Instant,
    deadline_at: Option<Instant>,
    expected: ExpectedExitCodes,
}

impl ExecutionController {
    async fn run(mut self) -> ExecutionOutcome {
        self.transition(ControllerState::Deciding);

        let event = match self.deadline_at {
            Some(at) => match tokio::time::timeout_at(at, self.events.recv()).await {
                Ok(event) => event,
                Err(_) => return self.time_out().await,
            },
            None => self.events.recv().await,
        };

        match event {
            Some(ExecutionEvent::ProcessExited(code)) => self.complete(code).await,
            Some(ExecutionEvent::StreamFailure(failure)) => self.abort(failure).await,
            Some(ExecutionEvent::WaitFailed(e)) => {
                tracing::warn!(error = %e, "waiting for process failed");
                self.kill_and_cancel().await;
                self.transition(ControllerState::Aborted);
                ExecutionOutcome::WaitFailed(e)
            }
            None => {
                // Every producer is gone without reporting; treat as a wait failure
                self.kill_and_cancel().await;
                self.transition(ControllerState::Aborted);
                ExecutionOutcome::WaitFailed(io::Error::other(
                    "event channel closed before the process reported an exit",
                ))
            }
        }
    }

    async fn complete(mut self, exit_code: i32) -> ExecutionOutcome {
        let elapsed = self.started.elapsed();
        tracing::debug!(exit_code, elapsed_ms = elapsed.as_millis() as u64, "process exited");

        // Draining after exit still counts against the deadline
        let failures = match self.deadline_at {
            Some(at) => match tokio::time::timeout_at(at, self.coordinator.join_all()).await {
                Ok(failures) => failures,
                Err(_) => return self.time_out().await,
            },
            None => self.coordinator.join_all().await,
        };
        self.waiter.join().await;
        debug_assert!(self.coordinator.all_finished());

        // A late stream failure invalidates a clean exit
        if let Some(failure) = failures.into_iter().next() {
            tracing::warn!(error = %failure, "stream failed after process exit");
            self.transition(ControllerState::Aborted);
            let (stdout, stderr) = self.coordinator.into_snapshots();
            return ExecutionOutcome::StreamFailed {
                failure,
                elapsed,
                stdout,
                stderr,
            };
        }

        self.transition(ControllerState::Completed);
        let (stdout, stderr) = self.coordinator.into_snapshots();
        classify(exit_code, elapsed, stdout, stderr, &self.expected)
    }

    async fn abort(mut self, failure: StreamFailure) -> ExecutionOutcome {
        tracing::warn!(error = %failure, "aborting run after stream failure");
        self.kill_and_cancel().await;
        self.transition(ControllerState::Aborted);

        let elapsed = self.started.elapsed();
        let (stdout, stderr) = self.coordinator.into_snapshots();
        ExecutionOutcome::StreamFailed {
            failure,
            elapsed,
            stdout,
            stderr,
        }
    }

    async fn time_out(mut self) -> ExecutionOutcome {
        let elapsed = self.started.elapsed();
        tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, "deadline elapsed; killing process");
        self.kill_and_cancel().await;
        self.transition(ControllerState::TimedOut);
        ExecutionOutcome::TimedOut { elapsed }
    }

    async fn kill_and_cancel(&mut self) {
        self.waiter.kill().await;
        self.coordinator.cancel_all().await;
    }

    fn transition(&mut self, next: ControllerState) {
        tracing::trace!(from = ?self.state, to = ?next, "controller transition");
        self.state = next;
    }
}

/// Owns the child; publishes its exit or kills it on request
struct Waiter {
    kill: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Waiter {
    fn start(mut child: Child, events: EventSender) -> Self {
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let pid = child.id();

        let handle = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) => ExecutionEvent::ProcessExited(exit_code(status)),
                        Err(e) => ExecutionEvent::WaitFailed(e),
                    };
                    let _ = events.send(event);
                }
                _ = kill_rx => {
                    // Kills and reaps; the child is gone once this returns
                    match child.kill().await {
                        Ok(()) => tracing::debug!(?pid, "process killed"),
                        Err(e) => tracing::warn!(error = %e, "failed to kill process"),
                    }
                }
            }
        });

        Self {
            kill: Some(kill_tx),
            handle: Some(handle),
        }
    }

    /// Kill the child (if still running) and wait until it has been reaped
    async fn kill(&mut self) {
        if let Some(tx) = self.kill.take() {
            let _ = tx.send(());
        }
        self.join().await;
    }

    async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "waiter task failed");
            }
        }
    }
}

/// Exit code, mapping signal deaths to `128 + signal` on Unix
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
