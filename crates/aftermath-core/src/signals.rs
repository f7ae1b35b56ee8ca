//! # Signal Registrar
//!
//! Installs handlers for the fixed set of fatal signals.
//!
//! The set is a build-time constant: segmentation violation, abort,
//! floating-point exception, bus error, illegal instruction and quit.
//! Every handler is installed with the whole set in its `sa_mask`, so while
//! one of them runs a second fatal signal of any kind stays pending until the
//! crash path explicitly unblocks the set.
//!
//! Installation never restores previous dispositions. It happens twice over
//! the life of a crash: [`Disposition::Primary`] at startup, then
//! [`Disposition::InternalFault`] once a crash is being handled.
//!
//! ## References
//!
//! - [sigaction(2)](https://man7.org/linux/man-pages/man2/sigaction.2.html)
//! - [sigaltstack(2)](https://man7.org/linux/man-pages/man2/sigaltstack.2.html)

use std::fmt;
use std::io;
use std::mem;
use std::ptr;

use libc::c_int;

use crate::console::write_stderr;
use crate::error::{CrashError, CrashResult};
use crate::handler;

/// Size of the per-thread alternate signal stack.
///
/// Report assembly (formatting, symbol lookup, file I/O) runs on this stack
/// when a thread overflows its own, so it is far larger than `SIGSTKSZ`.
pub const ALT_STACK_SIZE: usize = 256 * 1024;

/// A signal in the fatal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalSignal
{
    /// `SIGSEGV`
    SegmentationViolation,
    /// `SIGABRT`
    Abort,
    /// `SIGFPE`
    FloatingPointException,
    /// `SIGBUS`
    BusError,
    /// `SIGILL`
    IllegalInstruction,
    /// `SIGQUIT`
    Quit,
}

/// The signals we want the crash handler to handle.
pub const FATAL_SIGNALS: [FatalSignal; 6] = [
    FatalSignal::SegmentationViolation,
    FatalSignal::Abort,
    FatalSignal::FloatingPointException,
    FatalSignal::BusError,
    FatalSignal::IllegalInstruction,
    FatalSignal::Quit,
];

impl FatalSignal
{
    /// Raw signal number.
    pub const fn raw(self) -> c_int
    {
        match self {
            Self::SegmentationViolation => libc::SIGSEGV,
            Self::Abort => libc::SIGABRT,
            Self::FloatingPointException => libc::SIGFPE,
            Self::BusError => libc::SIGBUS,
            Self::IllegalInstruction => libc::SIGILL,
            Self::Quit => libc::SIGQUIT,
        }
    }

    /// Map a raw signal number back into the fatal set.
    pub fn from_raw(signum: c_int) -> Option<Self>
    {
        FATAL_SIGNALS.into_iter().find(|signal| signal.raw() == signum)
    }

    /// Conventional constant name, e.g. `SIGSEGV`.
    pub const fn name(self) -> &'static str
    {
        match self {
            Self::SegmentationViolation => "SIGSEGV",
            Self::Abort => "SIGABRT",
            Self::FloatingPointException => "SIGFPE",
            Self::BusError => "SIGBUS",
            Self::IllegalInstruction => "SIGILL",
            Self::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for FatalSignal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FatalSignal
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let upper = s.to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        match bare {
            "SEGV" => Ok(Self::SegmentationViolation),
            "ABRT" | "ABORT" => Ok(Self::Abort),
            "FPE" => Ok(Self::FloatingPointException),
            "BUS" => Ok(Self::BusError),
            "ILL" => Ok(Self::IllegalInstruction),
            "QUIT" => Ok(Self::Quit),
            _ => Err(format!(
                "Unknown fatal signal: {s}. Use 'segv', 'abrt', 'fpe', 'bus', 'ill', or 'quit'"
            )),
        }
    }
}

/// Which handler the fatal set is currently routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition
{
    /// Normal operation: the first fatal signal starts crash handling.
    Primary,
    /// A crash is already being handled: faults either resume the active
    /// guarded section or terminate as a double fault.
    InternalFault,
}

impl Disposition
{
    fn entry_point(self) -> extern "C" fn(c_int)
    {
        match self {
            Self::Primary => handler::primary_signal_handler,
            Self::InternalFault => handler::internal_fault_signal_handler,
        }
    }
}

/// Build a `sigset_t` containing every fatal signal.
pub fn fatal_sigset() -> libc::sigset_t
{
    unsafe {
        let mut sigs: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut sigs);
        for signal in FATAL_SIGNALS {
            libc::sigaddset(&mut sigs, signal.raw());
        }
        sigs
    }
}

/// Route every fatal signal to the handler for `disposition`.
///
/// The whole fatal set is masked while the handler runs. The previous
/// dispositions are discarded.
///
/// ## Errors
///
/// - `InstallFailed`: `sigaction(2)` rejected one of the signals
pub fn install(disposition: Disposition) -> CrashResult<libc::sigset_t>
{
    let sigs = fatal_sigset();

    unsafe {
        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_flags = libc::SA_RESTART | libc::SA_ONSTACK;
        sa.sa_mask = sigs;
        sa.sa_sigaction = disposition.entry_point() as libc::sighandler_t;

        for signal in FATAL_SIGNALS {
            if libc::sigaction(signal.raw(), &sa, ptr::null_mut()) != 0 {
                return Err(CrashError::InstallFailed {
                    signal: signal.name().to_string(),
                    source: io::Error::last_os_error(),
                });
            }
        }
    }

    Ok(sigs)
}

/// Route the fatal set to the internal-fault handler and unblock it.
///
/// Called once a crash is in progress. If the disposition cannot be changed,
/// a raw diagnostic goes to stderr and the previous handler stays in place.
pub(crate) fn arm_internal_fault_handler()
{
    if install(Disposition::InternalFault).is_err() {
        write_stderr(ARM_FAILED_MESSAGE);
    }
    unblock();
}

const ARM_FAILED_MESSAGE: &str =
    "Could not install the internal fault handler; a fault while writing the crash log will not be recovered.\n";

/// Unblock the fatal set for the calling thread.
pub fn unblock()
{
    change_mask(libc::SIG_UNBLOCK);
}

/// Block the fatal set for the calling thread.
#[cfg(test)]
pub(crate) fn block()
{
    change_mask(libc::SIG_BLOCK);
}

fn change_mask(how: c_int)
{
    let sigs = fatal_sigset();
    unsafe {
        libc::pthread_sigmask(how, &sigs, ptr::null_mut());
    }
}

/// Whether `signal` is currently blocked on the calling thread.
pub fn is_blocked(signal: FatalSignal) -> bool
{
    unsafe {
        let mut current: libc::sigset_t = mem::zeroed();
        libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), &mut current);
        libc::sigismember(&current, signal.raw()) == 1
    }
}

/// Give the calling thread an alternate signal stack.
///
/// Without one, a SIGSEGV caused by stack exhaustion cannot run any handler
/// at all. Call this once on every thread that should get crash reports;
/// [`crate::install`] does it for the installing thread. The stack is never
/// unmapped.
///
/// ## Errors
///
/// - `InstallFailed`: the stack could not be mapped or registered
pub fn init_thread() -> CrashResult<()>
{
    unsafe {
        let stack = libc::mmap(
            ptr::null_mut(),
            ALT_STACK_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        );
        if stack == libc::MAP_FAILED {
            return Err(CrashError::InstallFailed {
                signal: "alternate stack".to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let ss = libc::stack_t {
            ss_sp: stack,
            ss_flags: 0,
            ss_size: ALT_STACK_SIZE,
        };
        if libc::sigaltstack(&ss, ptr::null_mut()) != 0 {
            let source = io::Error::last_os_error();
            libc::munmap(stack, ALT_STACK_SIZE);
            return Err(CrashError::InstallFailed {
                signal: "alternate stack".to_string(),
                source,
            });
        }
    }

    Ok(())
}

/// Deliver `signal` to the calling thread.
///
/// Used by crash drills and tests to exercise the handler with a real signal.
pub fn raise(signal: FatalSignal)
{
    unsafe {
        libc::raise(signal.raw());
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashSet;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_fatal_set_is_distinct()
    {
        let raw: HashSet<c_int> = FATAL_SIGNALS.iter().map(|s| s.raw()).collect();
        assert_eq!(raw.len(), FATAL_SIGNALS.len());
        assert!(raw.contains(&libc::SIGSEGV));
        assert!(raw.contains(&libc::SIGQUIT));
    }

    #[test]
    fn test_from_raw()
    {
        for signal in FATAL_SIGNALS {
            assert_eq!(FatalSignal::from_raw(signal.raw()), Some(signal));
        }
        assert_eq!(FatalSignal::from_raw(libc::SIGTERM), None);
    }

    #[test]
    fn test_from_str()
    {
        assert_eq!(FatalSignal::from_str("segv").unwrap(), FatalSignal::SegmentationViolation);
        assert_eq!(FatalSignal::from_str("SIGABRT").unwrap(), FatalSignal::Abort);
        assert_eq!(FatalSignal::from_str("sigquit").unwrap(), FatalSignal::Quit);
        assert!(FatalSignal::from_str("term").is_err());
    }

    #[test]
    fn test_fatal_sigset_contains_every_signal()
    {
        let sigs = fatal_sigset();
        for signal in FATAL_SIGNALS {
            assert_eq!(unsafe { libc::sigismember(&sigs, signal.raw()) }, 1);
        }
        assert_eq!(unsafe { libc::sigismember(&sigs, libc::SIGTERM) }, 0);
    }

    fn current_entry_point(signal: FatalSignal) -> libc::sighandler_t
    {
        unsafe {
            let mut old: libc::sigaction = mem::zeroed();
            libc::sigaction(signal.raw(), ptr::null(), &mut old);
            old.sa_sigaction
        }
    }

    #[test]
    fn test_arm_internal_fault_handler()
    {
        std::thread::spawn(|| {
            block();
            arm_internal_fault_handler();

            let expected = Disposition::InternalFault.entry_point() as libc::sighandler_t;
            for signal in FATAL_SIGNALS {
                assert_eq!(current_entry_point(signal), expected, "{signal}");
                assert!(!is_blocked(signal), "{signal}");
            }
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_block_and_unblock()
    {
        // Signal masks are per thread, so run on a fresh one.
        std::thread::spawn(|| {
            block();
            assert!(is_blocked(FatalSignal::BusError));
            unblock();
            assert!(!is_blocked(FatalSignal::BusError));
        })
        .join()
        .unwrap();
    }
}
