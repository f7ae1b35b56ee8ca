//! Common module for library exports

pub use crate::artifact::{ArtifactNaming, ArtifactSink, FileSink};
pub use crate::assembler::LogAssembler;
pub use crate::config::CrashConfig;
pub use crate::dump::{CrashDumpWriter, DumpCompletion};
pub use crate::error::{CrashError, CrashResult};
pub use crate::gate::{EmergencyGate, OpenGate, Outcome, ProcessTerminator, Terminator};
pub use crate::handler::{install, set_error_message, CrashHandler, CrashHandlerBuilder};
pub use crate::report::{CrashContext, CrashReport, ReportSection, SectionResult};
pub use crate::signals::{FatalSignal, FATAL_SIGNALS};
