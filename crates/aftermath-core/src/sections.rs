//! # Built-in Report Sections
//!
//! The fixed sections every crash report starts with, in order:
//!
//! 1. [`HeaderSection`]: report identification
//! 2. [`OsVersionSection`]: `uname(2)` output, or a fallback line
//! 3. [`ErrorReasonSection`]: the signal and the application's message
//! 4. [`StacktraceSection`]: the faulting thread's frames, or "Not supported."

use std::fmt::Write;
use std::io;

use crate::platform::{self, SystemName};
use crate::report::{CrashContext, ReportSection};
use crate::stacktrace::{PlatformWalker, StackWalker};

/// Report identification: application, version and time of the crash.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderSection;

impl ReportSection for HeaderSection
{
    fn name(&self) -> &str
    {
        "header"
    }

    fn produce(&self, context: &CrashContext<'_>, out: &mut String) -> bool
    {
        writeln!(
            out,
            "*** {} Crash Report ***\n\nCrash at: {} (UTC)\nVersion:  {}\n",
            context.config.app_name,
            context.crashed_at.format("%Y-%m-%d %H:%M:%S"),
            context.config.app_version,
        )
        .is_ok()
    }
}

/// Function that identifies the operating system.
pub type OsQuery = fn() -> io::Result<SystemName>;

/// Operating system identification.
///
/// A failed query is rendered as `Could not get OS version: <reason>` and the
/// section still succeeds.
#[derive(Debug, Clone, Copy)]
pub struct OsVersionSection
{
    query: OsQuery,
}

impl OsVersionSection
{
    /// Section backed by a custom query.
    pub fn with_query(query: OsQuery) -> Self
    {
        Self { query }
    }
}

impl Default for OsVersionSection
{
    fn default() -> Self
    {
        Self::with_query(platform::uname)
    }
}

impl ReportSection for OsVersionSection
{
    fn name(&self) -> &str
    {
        "OS version"
    }

    fn produce(&self, _context: &CrashContext<'_>, out: &mut String) -> bool
    {
        let written = match (self.query)() {
            Ok(name) => write!(
                out,
                "Operating system:\n Name:     {}\n Release:  {}\n Version:  {}\n Machine:  {}\n\n",
                name.sysname, name.release, name.version, name.machine
            ),
            Err(err) => write!(out, "Could not get OS version: {err}\n\n"),
        };
        written.is_ok()
    }
}

/// The triggering signal and the optional application message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReasonSection;

impl ReportSection for ErrorReasonSection
{
    fn name(&self) -> &str
    {
        "error"
    }

    fn produce(&self, context: &CrashContext<'_>, out: &mut String) -> bool
    {
        write!(
            out,
            "Crash reason:\n Signal:  {} ({})\n Message: {}\n\n",
            platform::signal_description(context.signal),
            context.signal,
            context.message.unwrap_or("<none>"),
        )
        .is_ok()
    }
}

/// The faulting thread's call stack.
pub struct StacktraceSection
{
    walker: Box<dyn StackWalker>,
}

impl StacktraceSection
{
    /// Section backed by a custom walker.
    pub fn with_walker(walker: impl StackWalker + 'static) -> Self
    {
        Self {
            walker: Box::new(walker),
        }
    }
}

impl Default for StacktraceSection
{
    fn default() -> Self
    {
        Self::with_walker(PlatformWalker)
    }
}

impl std::fmt::Debug for StacktraceSection
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("StacktraceSection").finish_non_exhaustive()
    }
}

impl ReportSection for StacktraceSection
{
    fn name(&self) -> &str
    {
        "stacktrace"
    }

    fn produce(&self, context: &CrashContext<'_>, out: &mut String) -> bool
    {
        out.push_str("Stacktrace:\n");
        match self.walker.capture(context.config.stack_depth) {
            Some(frames) => {
                for frame in frames {
                    if writeln!(out, " {frame}").is_err() {
                        return false;
                    }
                }
            }
            None => out.push_str(" Not supported.\n"),
        }
        out.push('\n');
        true
    }
}
