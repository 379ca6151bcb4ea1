//! Process execution machinery
//!
//! Spawns the child, drains its streams concurrently, races exit against
//! stream failures and the deadline, and classifies the result.

pub mod classify;
pub mod controller;
pub mod coordinator;
pub mod launcher;
pub mod outcome;
pub mod task;

pub use classify::{classify, ExpectedExitCodes};
pub use controller::{execute, ControllerState, Deadline, ExecutionEvent, Invocation};
pub use coordinator::{InputSource, IoCoordinator, IoPipes};
pub use launcher::{launch, LaunchSpec, LaunchedProcess};
pub use outcome::{Completion, ExecutionOutcome, OutputSnapshot, StreamFailure, StreamKind};
pub use task::{ConsumptionTask, ProcessStream, StreamConsumer, Strategy, TaskReport};
