//! # Emergency Gate and Terminator
//!
//! The gate decides, before any session exists, whether a report should be
//! attempted at all. The terminator ends the process once handling is over,
//! with an exit code that tells a supervising process what happened:
//!
//! | Outcome | Exit code | Meaning |
//! |---|---|---|
//! | [`Outcome::DoubleFault`] | 1 | fault outside any guarded section while handling a crash |
//! | [`Outcome::Handled`] | 2 | report attempted, or re-entry after a session already existed |
//! | [`Outcome::Suppressed`] | 3 | the gate suppressed reporting |

use std::fmt;

use libc::c_int;

/// Terminal classification of a crash-handling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome
{
    /// Crash handled; a report was attempted.
    Handled,
    /// Unrecoverable fault while handling a crash.
    DoubleFault,
    /// Reporting was deliberately suppressed.
    Suppressed,
}

impl Outcome
{
    /// Process exit code for this outcome.
    pub const fn exit_code(self) -> c_int
    {
        match self {
            Self::DoubleFault => 1,
            Self::Handled => 2,
            Self::Suppressed => 3,
        }
    }
}

impl fmt::Display for Outcome
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let name = match self {
            Self::Handled => "handled",
            Self::DoubleFault => "double fault",
            Self::Suppressed => "suppressed",
        };
        write!(f, "{name} (exit code {})", self.exit_code())
    }
}

/// Pre-report suppression checks, supplied by the application.
///
/// Both predicates are consulted in order before a session is created. If
/// either returns `true`, no report is produced.
pub trait EmergencyGate: Send + Sync
{
    /// The active state is inherently unsafe to introspect.
    fn unsafe_state(&self) -> bool
    {
        false
    }

    /// Content the report depends on is missing, so nobody could act on it.
    fn missing_content(&self) -> bool
    {
        false
    }
}

/// A gate that never suppresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl EmergencyGate for OpenGate {}

/// Ends the process once crash handling is over.
pub trait Terminator: Send + Sync
{
    /// Run cleanup and end the process with `outcome`'s exit code.
    ///
    /// Production implementations never return.
    fn terminate(&self, outcome: Outcome);
}

/// Cleanup hook run right before the process exits.
pub type Cleanup = Box<dyn Fn() + Send + Sync>;

/// Terminates via `_exit(2)`: no atexit handlers, no unwinding, no flushing
/// of Rust buffers. Nothing in the process can be trusted for a graceful
/// teardown.
#[derive(Default)]
pub struct ProcessTerminator
{
    cleanup: Option<Cleanup>,
}

impl ProcessTerminator
{
    /// A terminator that runs `cleanup` before exiting.
    pub fn with_cleanup(cleanup: impl Fn() + Send + Sync + 'static) -> Self
    {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }
}

impl fmt::Debug for ProcessTerminator
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ProcessTerminator")
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

impl Terminator for ProcessTerminator
{
    fn terminate(&self, outcome: Outcome)
    {
        if let Some(cleanup) = &self.cleanup {
            cleanup();
        }
        exit_immediately(outcome)
    }
}

/// `_exit` with `outcome`'s code.
pub fn exit_immediately(outcome: Outcome) -> !
{
    unsafe { libc::_exit(outcome.exit_code()) }
}
