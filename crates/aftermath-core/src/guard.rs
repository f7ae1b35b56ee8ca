//! # Guarded Section Executor
//!
//! Runs one report-producing step so that a fault inside it costs only that
//! step.
//!
//! Before the producer runs, a checkpoint is recorded with `sigsetjmp` and the
//! session's guard flag is raised. If a fatal signal arrives while the guard is
//! up, the internal-fault handler calls [`resume`], which `siglongjmp`s back to
//! the checkpoint. [`run_guarded`] then sees the non-zero return, clears the
//! guard and reports failure. Nothing the producer wrote is trusted.
//!
//! `sigsetjmp` is called with `savemask = 1`, so resuming also restores the
//! signal mask captured at the checkpoint (fatal set unblocked). A later fault
//! in orchestration code therefore still reaches the internal-fault handler.
//!
//! Rust has no notion of a "returns twice" function. To keep this sound in
//! practice, `run_guarded` is never inlined, the checkpoint lives in the
//! session (not on the stack), and nothing that `run_guarded` reads after the
//! jump is modified between checkpoint and jump.

use libc::c_int;

use crate::session::CrashSession;
use crate::signals;

/// Opaque `sigjmp_buf`.
///
/// `libc` does not expose `sigjmp_buf`, so it is over-allocated here: glibc's
/// is 200 bytes on x86-64, macOS's is under 200 bytes on arm64.
#[repr(C, align(16))]
pub(crate) struct Checkpoint
{
    _buf: [u8; 512],
}

impl Checkpoint
{
    pub(crate) const fn zeroed() -> Self
    {
        Self { _buf: [0; 512] }
    }
}

extern "C" {
    // On glibc sigsetjmp is a macro over __sigsetjmp.
    #[cfg_attr(all(target_os = "linux", target_env = "gnu"), link_name = "__sigsetjmp")]
    fn sigsetjmp(env: *mut Checkpoint, savemask: c_int) -> c_int;
    fn siglongjmp(env: *mut Checkpoint, val: c_int) -> !;
}

/// Run `producer` as the guarded section `section`.
///
/// Returns the producer's result, or `false` if a fatal signal interrupted it.
/// The session's guard flag is clear again when this returns, either way.
///
/// The fatal set is routed to the internal-fault handler and unblocked before
/// the producer runs.
#[inline(never)]
pub fn run_guarded<F>(session: &CrashSession, section: &str, producer: F) -> bool
where
    F: FnOnce() -> bool,
{
    signals::arm_internal_fault_handler();

    session.set_guard_active(true);

    // SAFETY: the checkpoint outlives this frame (the session is never freed)
    // and `resume` only jumps while the guard raised above is still set, i.e.
    // while this frame is live.
    if unsafe { sigsetjmp(session.checkpoint(), 1) } != 0 {
        session.set_guard_active(false);
        eprintln!("Something went wrong when attempting to fill the {section} section of the crash log.");
        return false;
    }

    let result = producer();
    session.set_guard_active(false);
    result
}

/// Abandon the in-flight guarded section and continue at its checkpoint.
///
/// # Safety
///
/// `session.is_guard_active()` must be true, which guarantees the frame that
/// recorded the checkpoint is still on the stack of the calling thread.
pub(crate) unsafe fn resume(session: &CrashSession) -> !
{
    siglongjmp(session.checkpoint(), 1)
}
