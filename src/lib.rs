//! procrun - run external processes without deadlocks
//!
//! Launches a child process, feeds it optional input, drains stdout and
//! stderr concurrently, enforces a wall-clock deadline and classifies the
//! result by exit code.
//!
//! ## Features
//!
//! - Fluent [`ProcBuilder`] with captured output or caller-owned streams
//! - Deadline measured from spawn, covering the stream drains
//! - Any stream failure aborts the run and kills the child
//! - XDG-compliant layered configuration with named profiles
//!
//! ```no_run
//! # async fn demo() -> Result<(), procrun::ProcError> {
//! let result = procrun::ProcBuilder::new("echo")
//!     .with_arg("Hello World!")
//!     .with_timeout_millis(1000)
//!     .run()
//!     .await?;
//! assert_eq!(result.output_string()?, "Hello World!\n");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod proc;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ErrorInfo, ProcError};
pub use executor::{Deadline, ExecutionOutcome, ExpectedExitCodes, OutputSnapshot, StreamKind};
pub use proc::{filter, format_command_line, run, ProcBuilder, ProcResult};
