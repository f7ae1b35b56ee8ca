//! # Crash Handler
//!
//! Orchestrates one crash from signal delivery to process exit.
//!
//! ## Control Flow
//!
//! 1. A fatal signal reaches [`primary_signal_handler`].
//! 2. If a session already exists, this is re-entry into the primary path:
//!    no new report, terminate with [`Outcome::Handled`].
//! 3. The fatal set is rerouted to [`internal_fault_signal_handler`] and
//!    unblocked, so a fault from here on is either recovered (inside a
//!    guarded section) or a double fault.
//! 4. The [`EmergencyGate`] may suppress reporting: terminate with
//!    [`Outcome::Suppressed`], no session, no artifact.
//! 5. The session is created, the report is assembled section by section,
//!    handed to the [`ArtifactSink`], and optionally a memory dump is written.
//! 6. The [`Terminator`] ends the process with [`Outcome::Handled`].
//!
//! A fault outside every guarded section ends the process with
//! [`Outcome::DoubleFault`] straight away. The terminator's cleanup is not run
//! on that path, as the cleanup may itself be what faulted.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aftermath_core::config::CrashConfig;
//! use aftermath_core::handler::CrashHandler;
//!
//! let config = CrashConfig::from_env()?.with_app("my-app", "1.0.0");
//! let handler = CrashHandler::builder(config).cleanup(|| eprintln!("releasing locks")).build();
//! aftermath_core::install(handler)?;
//! # Ok::<(), aftermath_core::error::CrashError>(())
//! ```

use libc::c_int;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::artifact::{ArtifactNaming, ArtifactSink, FileSink};
use crate::assembler::LogAssembler;
use crate::config::CrashConfig;
use crate::console::write_stderr;
use crate::dump::{write_crash_dump, CrashDumpWriter};
use crate::error::{CrashError, CrashResult};
use crate::gate::{exit_immediately, EmergencyGate, OpenGate, Outcome, ProcessTerminator, Terminator};
use crate::guard::{self, run_guarded};
use crate::report::{CrashContext, CrashReport, ReportSection};
use crate::session::{CrashSession, SessionSlot, CRASH_SESSION};
use crate::signals::{self, Disposition, FATAL_SIGNALS};

const DOUBLE_FAULT_MESSAGE: &str = "Something went seriously wrong when creating the crash log. Aborting.\n";

/// The handler consulted by the installed signal entry points.
static HANDLER: OnceCell<CrashHandler> = OnceCell::new();

/// Free-text message for the error-reason section.
static ERROR_MESSAGE: OnceCell<String> = OnceCell::new();

/// Record a message to include in the report of the next crash.
///
/// Call this right before deliberately aborting on a fatal application error.
///
/// Only the first message is kept; later calls are ignored. The report is
/// read from a signal handler, so the message cannot be replaced once set.
/// An application that recovers from an error and crashes later will
/// therefore report the first message, not the latest one.
pub fn set_error_message(message: impl Into<String>)
{
    let _ = ERROR_MESSAGE.set(message.into());
}

/// Everything needed to handle a crash, assembled up front.
pub struct CrashHandler
{
    config: CrashConfig,
    gate: Box<dyn EmergencyGate>,
    assembler: LogAssembler,
    sink: Box<dyn ArtifactSink>,
    dump_writer: Option<Box<dyn CrashDumpWriter>>,
    terminator: Box<dyn Terminator>,
}

impl std::fmt::Debug for CrashHandler
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("CrashHandler")
            .field("config", &self.config)
            .field("assembler", &self.assembler)
            .field("dump_writer", &self.dump_writer.is_some())
            .finish_non_exhaustive()
    }
}

impl CrashHandler
{
    /// Start configuring a handler.
    pub fn builder(config: CrashConfig) -> CrashHandlerBuilder
    {
        CrashHandlerBuilder::new(config)
    }

    /// Active configuration.
    pub fn config(&self) -> &CrashConfig
    {
        &self.config
    }

    /// Handle fatal signal `signum` using the session in `slot`.
    ///
    /// Ends by calling the terminator. With a [`ProcessTerminator`] this never
    /// returns; other terminators get the outcome back.
    pub fn handle_fatal_signal(&self, slot: &SessionSlot, signum: c_int) -> Outcome
    {
        if slot.current().is_some() {
            return self.finish(Outcome::Handled);
        }

        // From here on a fault goes to the internal-fault handler.
        signals::arm_internal_fault_handler();

        if self.gate.unsafe_state() {
            eprintln!("A serious fault condition occurred in {}. It will shut down.", self.config.app_name);
            eprintln!("The active state is marked as an emergency state, so no crash information will be generated.");
            return self.finish(Outcome::Suppressed);
        }

        if self.gate.missing_content() {
            eprintln!("A serious fault condition occurred in {}. It will shut down.", self.config.app_name);
            eprintln!("Content required by the active state is missing,");
            eprintln!("so no crash information will be generated.");
            return self.finish(Outcome::Suppressed);
        }

        let session = slot.create(signum);
        eprintln!("Crash encountered, generating crash log...");

        let context = CrashContext::new(signum, ERROR_MESSAGE.get().map(String::as_str), &self.config);
        let report = self.assembler.assemble(session, &context);

        self.persist_report(session, &report);
        self.write_dump(session, &report);

        self.finish(Outcome::Handled)
    }

    fn persist_report(&self, session: &CrashSession, report: &CrashReport)
    {
        let persisted = run_guarded(session, "crash log", || match self.sink.persist(report) {
            Ok(path) => {
                eprintln!("Crash log written to {}. Please add this file to any bug reports.", path.display());
                true
            }
            Err(err) => {
                eprintln!("Writing crash log failed: {err}");
                false
            }
        });
        if !persisted {
            eprintln!("Writing crash log failed. Please attach the console output above to any bug reports.");
        }
    }

    fn write_dump(&self, session: &CrashSession, report: &CrashReport)
    {
        let Some(writer) = self.dump_writer.as_deref() else {
            return;
        };
        if !self.config.write_dump {
            return;
        }

        let naming = ArtifactNaming::new(&self.config.output_dir, report.crashed_at);
        run_guarded(session, "crash dump", || match write_crash_dump(writer, &naming) {
            Ok(path) => {
                eprintln!("Crash dump written to {}. Please add this file to any bug reports.", path.display());
                true
            }
            Err(err) => {
                eprintln!("Writing crash dump failed: {err}");
                false
            }
        });
    }

    fn finish(&self, outcome: Outcome) -> Outcome
    {
        self.terminator.terminate(outcome);
        outcome
    }
}

/// Builder for [`CrashHandler`].
///
/// Defaults: never-suppressing gate, the four standard report sections, a
/// [`FileSink`] writing to `config.output_dir`, no dump writer, and a
/// [`ProcessTerminator`] without cleanup.
pub struct CrashHandlerBuilder
{
    config: CrashConfig,
    gate: Option<Box<dyn EmergencyGate>>,
    assembler: LogAssembler,
    sink: Option<Box<dyn ArtifactSink>>,
    dump_writer: Option<Box<dyn CrashDumpWriter>>,
    terminator: Option<Box<dyn Terminator>>,
}

impl std::fmt::Debug for CrashHandlerBuilder
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("CrashHandlerBuilder")
            .field("config", &self.config)
            .field("gate", &self.gate.is_some())
            .field("assembler", &self.assembler)
            .field("sink", &self.sink.is_some())
            .field("dump_writer", &self.dump_writer.is_some())
            .field("terminator", &self.terminator.is_some())
            .finish()
    }
}

impl CrashHandlerBuilder
{
    /// Builder with defaults for `config`.
    pub fn new(config: CrashConfig) -> Self
    {
        Self {
            config,
            gate: None,
            assembler: LogAssembler::standard(),
            sink: None,
            dump_writer: None,
            terminator: None,
        }
    }

    /// Use `gate` for the pre-report suppression checks.
    #[must_use]
    pub fn gate(mut self, gate: impl EmergencyGate + 'static) -> Self
    {
        self.gate = Some(Box::new(gate));
        self
    }

    /// Append a report section after the standard ones.
    #[must_use]
    pub fn section(mut self, section: impl ReportSection + 'static) -> Self
    {
        self.assembler.push(Box::new(section));
        self
    }

    /// Replace the whole section list.
    #[must_use]
    pub fn assembler(mut self, assembler: LogAssembler) -> Self
    {
        self.assembler = assembler;
        self
    }

    /// Hand the finished report to `sink`.
    #[must_use]
    pub fn sink(mut self, sink: impl ArtifactSink + 'static) -> Self
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Ask `writer` for a memory dump after the report is written.
    #[must_use]
    pub fn dump_writer(mut self, writer: impl CrashDumpWriter + 'static) -> Self
    {
        self.dump_writer = Some(Box::new(writer));
        self
    }

    /// End the process through `terminator`.
    #[must_use]
    pub fn terminator(mut self, terminator: impl Terminator + 'static) -> Self
    {
        self.terminator = Some(Box::new(terminator));
        self
    }

    /// Use a [`ProcessTerminator`] that runs `cleanup` before exiting.
    #[must_use]
    pub fn cleanup(self, cleanup: impl Fn() + Send + Sync + 'static) -> Self
    {
        self.terminator(ProcessTerminator::with_cleanup(cleanup))
    }

    /// Finish the handler.
    pub fn build(self) -> CrashHandler
    {
        let sink = self
            .sink
            .unwrap_or_else(|| Box::new(FileSink::new(self.config.output_dir.clone())));

        CrashHandler {
            gate: self.gate.unwrap_or_else(|| Box::new(OpenGate)),
            assembler: self.assembler,
            sink,
            dump_writer: self.dump_writer,
            terminator: self.terminator.unwrap_or_else(|| Box::new(ProcessTerminator::default())),
            config: self.config,
        }
    }
}

/// Install `handler` for every fatal signal.
///
/// This is a one-way commitment for the life of the process: previous
/// dispositions are discarded and a second call fails. The calling thread
/// also gets an alternate signal stack (see [`signals::init_thread`]).
///
/// ## Errors
///
/// - `AlreadyInstalled`: a handler was installed before
/// - `InstallFailed`: the alternate stack could not be set up (nothing is
///   stored, so `install` may be retried) or the kernel rejected a disposition
pub fn install(handler: CrashHandler) -> CrashResult<()>
{
    let handler = store_handler(&HANDLER, handler, signals::init_thread)?;
    signals::install(Disposition::Primary)?;

    info!(
        signals = ?FATAL_SIGNALS.map(|signal| signal.name()),
        "Crash handler installed"
    );
    debug!(
        output_dir = %handler.config.output_dir.display(),
        stack_depth = handler.config.stack_depth,
        "Crash handler configuration"
    );
    Ok(())
}

/// Store `handler` in `cell` once `prepare_thread` has succeeded.
fn store_handler<P>(
    cell: &OnceCell<CrashHandler>,
    handler: CrashHandler,
    prepare_thread: P,
) -> CrashResult<&CrashHandler>
where
    P: FnOnce() -> CrashResult<()>,
{
    if cell.get().is_some() {
        return Err(CrashError::AlreadyInstalled);
    }
    prepare_thread()?;

    cell.set(handler).map_err(|_| CrashError::AlreadyInstalled)?;
    cell.get().ok_or(CrashError::AlreadyInstalled)
}

/// Handle a fault that arrived while a crash was already being handled.
///
/// If a guarded section of the session in `slot` is in flight, control
/// resumes at its checkpoint and this does not return. Otherwise there is no
/// safe recovery point: a minimal diagnostic is written and
/// [`Outcome::DoubleFault`] is returned for the caller to exit with. No
/// cleanup runs.
pub fn handle_internal_fault(slot: &SessionSlot) -> Outcome
{
    recover_if_guarded(slot);
    write_stderr(DOUBLE_FAULT_MESSAGE);
    Outcome::DoubleFault
}

/// Jump back into the in-flight guarded section of the session in `slot`, if
/// there is one. Returns only if no guard is active.
fn recover_if_guarded(slot: &SessionSlot)
{
    if let Some(session) = slot.current().filter(|session| session.is_guard_active()) {
        // SAFETY: the guard flag is only set while the checkpointing frame of
        // `run_guarded` is live on this thread.
        unsafe { guard::resume(session) }
    }
}

/// Entry point for the first fatal signal.
pub(crate) extern "C" fn primary_signal_handler(signum: c_int)
{
    let Some(handler) = HANDLER.get() else {
        write_stderr(DOUBLE_FAULT_MESSAGE);
        exit_immediately(Outcome::DoubleFault)
    };

    let outcome = handler.handle_fatal_signal(&CRASH_SESSION, signum);
    exit_immediately(outcome)
}

/// Entry point for faults during crash handling.
pub(crate) extern "C" fn internal_fault_signal_handler(_signum: c_int)
{
    exit_immediately(handle_internal_fault(&CRASH_SESSION))
}
