//! # aftermath-core
//!
//! Fatal-signal crash capture for long-running native applications.
//!
//! When the process receives SIGSEGV, SIGABRT, SIGFPE, SIGBUS, SIGILL or
//! SIGQUIT, this crate produces one best-effort crash report and ends the
//! process with an exit code describing what happened:
//!
//! - `1`: a fault occurred while handling the crash, outside any guarded section
//! - `2`: the crash was handled (the report may contain failed sections)
//! - `3`: reporting was suppressed by the application's emergency gate
//!
//! ## Building Blocks
//!
//! - [`signals`]: installs handlers for the fatal signal set
//! - [`session`]: the process-wide "a crash is being handled" slot
//! - [`guard`]: runs one report section so a fault inside it is recoverable
//! - [`assembler`] and [`sections`]: the ordered report sections
//! - [`stacktrace`]: best-effort call stack capture
//! - [`gate`]: the suppression checks and the exit-code contract
//! - [`artifact`] and [`dump`]: where the report and the memory dump go
//! - [`handler`]: ties it all together
//!
//! ## Why unsafe code is needed
//!
//! Signal dispositions, signal masks, alternate stacks, `uname`, `execinfo`
//! and the `sigsetjmp`/`siglongjmp` checkpoint are all raw libc interfaces.
//! The unsafe calls are wrapped in safe functions; the one genuinely
//! delicate piece (non-local resumption) stays private to [`guard`].
//!
//! ## Platform Support
//!
//! Unix only. Stack traces need glibc's `execinfo`; elsewhere the stack
//! section reports "Not supported."

#![allow(unsafe_code)] // Required for signal handling and libc system APIs

pub mod artifact;
pub mod assembler;
pub mod config;
pub mod console;
pub mod dump;
pub mod error;
pub mod gate;
pub mod guard;
pub mod handler;
pub mod platform;
pub mod prelude;
pub mod report;
pub mod sections;
pub mod session;
pub mod signals;
pub mod stacktrace;

// Re-export commonly used types
pub use error::{CrashError, CrashResult};
pub use gate::Outcome;
pub use handler::{install, set_error_message, CrashHandler};
pub use signals::{FatalSignal, FATAL_SIGNALS};
