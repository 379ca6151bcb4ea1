//! Caller-facing API: configure a run, execute it, read the result

pub mod builder;
pub mod command_line;
pub mod result;

pub use builder::{filter, run, ProcBuilder, DEFAULT_TIMEOUT_MS};
pub use command_line::format_command_line;
pub use result::{into_result, ProcResult};
