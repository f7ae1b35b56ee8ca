//! # Stack Trace Capture
//!
//! Best-effort rendering of the faulting thread's call stack.
//!
//! On glibc the `execinfo` facility (`backtrace(3)` and
//! `backtrace_symbols(3)`) walks the stack. Elsewhere there is no walker and
//! [`capture_trace`] returns `None`, which the report renders as a
//! "Not supported." line. That is reduced fidelity, never an error.
//!
//! Frame descriptions come straight from `backtrace_symbols`
//! (`module(symbol+offset) [address]`); mangled Rust and C++ symbols are
//! demangled with `rustc_demangle`.

use std::fmt;

use rustc_demangle::try_demangle;

/// Default bound on captured frames. Deeper stacks are truncated.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard bound on captured frames, whatever depth is requested.
///
/// The frame buffer is allocated while handling a crash, so it must stay small.
pub const MAX_DEPTH: usize = 4096;

/// One captured stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame
{
    /// Zero-based position, innermost first.
    pub index: usize,
    /// Return address of the frame.
    pub address: usize,
    /// Best-effort symbolic description.
    pub description: String,
}

impl fmt::Display for StackFrame
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "[{:02}] {}", self.index, self.description)
    }
}

/// Source of stack frames.
pub trait StackWalker: Send + Sync
{
    /// Capture at most `max_depth` frames of the calling thread.
    ///
    /// Returns `None` when the platform cannot walk the stack.
    fn capture(&self, max_depth: usize) -> Option<Vec<StackFrame>>;
}

/// The platform's own walker (`execinfo` on glibc).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformWalker;

/// A walker for platforms without stack introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedWalker;

impl StackWalker for UnsupportedWalker
{
    fn capture(&self, _max_depth: usize) -> Option<Vec<StackFrame>>
    {
        None
    }
}

/// Capture the calling thread's stack with the platform walker.
pub fn capture_trace(max_depth: usize) -> Option<Vec<StackFrame>>
{
    PlatformWalker.capture(max_depth)
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod execinfo
{
    use std::ffi::CStr;

    use libc::{c_char, c_int, c_void};

    use super::{demangle_description, StackFrame, MAX_DEPTH};

    extern "C" {
        fn backtrace(buffer: *mut *mut c_void, size: c_int) -> c_int;
        fn backtrace_symbols(buffer: *const *mut c_void, size: c_int) -> *mut *mut c_char;
    }

    pub(super) fn walk(max_depth: usize) -> Vec<StackFrame>
    {
        let max_depth = max_depth.min(MAX_DEPTH);
        let depth = c_int::try_from(max_depth).unwrap_or(c_int::MAX);
        let mut trace: Vec<*mut c_void> = vec![std::ptr::null_mut(); max_depth];
        if trace.is_empty() {
            return Vec::new();
        }

        unsafe {
            let captured = backtrace(trace.as_mut_ptr(), depth);
            let count = usize::try_from(captured).unwrap_or(0);
            let symbols = backtrace_symbols(trace.as_ptr(), captured);

            let frames = (0..count)
                .map(|index| {
                    let address = trace[index] as usize;
                    let description = if symbols.is_null() {
                        format!("[{address:#x}]")
                    } else {
                        let line = CStr::from_ptr(*symbols.add(index)).to_string_lossy();
                        demangle_description(&line)
                    };
                    StackFrame {
                        index,
                        address,
                        description,
                    }
                })
                .collect();

            if !symbols.is_null() {
                libc::free(symbols.cast());
            }
            frames
        }
    }
}

impl StackWalker for PlatformWalker
{
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn capture(&self, max_depth: usize) -> Option<Vec<StackFrame>>
    {
        Some(execinfo::walk(max_depth))
    }

    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    fn capture(&self, _max_depth: usize) -> Option<Vec<StackFrame>>
    {
        None
    }
}

/// Demangle the symbol inside a `module(symbol+offset) [address]` line.
///
/// Lines without a recognisable mangled symbol are returned unchanged.
pub fn demangle_description(line: &str) -> String
{
    let Some(open) = line.find('(') else {
        return line.to_string();
    };
    let rest = &line[open + 1..];
    let Some(end) = rest.find(['+', ')']) else {
        return line.to_string();
    };

    let symbol = &rest[..end];
    if symbol.is_empty() {
        return line.to_string();
    }

    match try_demangle(symbol) {
        Ok(demangled) => format!("{}{:#}{}", &line[..=open], demangled, &rest[end..]),
        Err(_) => line.to_string(),
    }
}
