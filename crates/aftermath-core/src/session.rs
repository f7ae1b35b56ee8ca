//! # Crash Session
//!
//! Process-wide record of "a crash is being handled".
//!
//! Signal handlers are bare function pointers with no closure context, so the
//! only way for them to notice re-entry is state reachable from a static. That
//! state is kept to one slot, [`CRASH_SESSION`], with a narrow mutation
//! contract:
//!
//! - the first-fault path fills the slot exactly once ([`SessionSlot::create`]);
//! - the guarded section executor toggles `active_guard` and writes/consumes
//!   the checkpoint;
//! - nothing ever empties the slot or frees the session. The process is
//!   terminating.
//!
//! No locks are used. Access is serialized by the fatal-signal mask, and the
//! slot itself is a single atomic pointer so a handler can read it safely.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use libc::c_int;

use crate::guard::Checkpoint;

/// State of the crash currently being handled.
pub struct CrashSession
{
    signal: c_int,
    active_guard: AtomicBool,
    checkpoint: UnsafeCell<Checkpoint>,
}

// The checkpoint is only touched by the thread handling the crash, with the
// fatal set masked around every access.
unsafe impl Sync for CrashSession {}

impl CrashSession
{
    fn new(signal: c_int) -> Self
    {
        Self {
            signal,
            active_guard: AtomicBool::new(false),
            checkpoint: UnsafeCell::new(Checkpoint::zeroed()),
        }
    }

    /// Signal that created this session.
    pub fn signal(&self) -> c_int
    {
        self.signal
    }

    /// Whether a guarded section is in flight.
    pub fn is_guard_active(&self) -> bool
    {
        self.active_guard.load(Ordering::Acquire)
    }

    pub(crate) fn set_guard_active(&self, active: bool)
    {
        self.active_guard.store(active, Ordering::Release);
    }

    pub(crate) fn checkpoint(&self) -> *mut Checkpoint
    {
        self.checkpoint.get()
    }
}

impl std::fmt::Debug for CrashSession
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("CrashSession")
            .field("signal", &self.signal)
            .field("active_guard", &self.is_guard_active())
            .finish_non_exhaustive()
    }
}

/// A create-once slot holding at most one [`CrashSession`].
///
/// The process uses [`CRASH_SESSION`]; tests may build their own slot.
pub struct SessionSlot
{
    current: AtomicPtr<CrashSession>,
}

impl SessionSlot
{
    /// An empty slot.
    pub const fn new() -> Self
    {
        Self {
            current: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// The session in this slot, if a crash is being handled.
    pub fn current(&self) -> Option<&CrashSession>
    {
        let session = self.current.load(Ordering::Acquire);
        // SAFETY: a non-null pointer came from `Box::leak` in `create` and is
        // never freed.
        unsafe { session.as_ref() }
    }

    /// Create the session for `signal`.
    ///
    /// If the slot is already filled the existing session is returned and
    /// `signal` is dropped; the slot is never overwritten.
    pub fn create(&self, signal: c_int) -> &CrashSession
    {
        let fresh: *mut CrashSession = Box::leak(Box::new(CrashSession::new(signal)));
        match self
            .current
            .compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire)
        {
            // SAFETY: `fresh` is a leaked, never-freed allocation.
            Ok(_) => unsafe { &*fresh },
            Err(existing) => {
                // SAFETY: `fresh` was never published; `existing` is leaked.
                unsafe {
                    drop(Box::from_raw(fresh));
                    &*existing
                }
            }
        }
    }

    /// Whether the slot holds a session.
    pub fn is_occupied(&self) -> bool
    {
        !self.current.load(Ordering::Acquire).is_null()
    }
}

impl Default for SessionSlot
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// The one session slot consulted by the installed signal handlers.
pub static CRASH_SESSION: SessionSlot = SessionSlot::new();
