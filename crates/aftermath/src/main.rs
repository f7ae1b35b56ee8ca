use std::path::PathBuf;
use std::process;

use aftermath_core::config::CrashConfig;
use aftermath_core::gate::EmergencyGate;
use aftermath_core::platform::signal_description;
use aftermath_core::report::{CrashContext, ReportSection};
use aftermath_core::session::CRASH_SESSION;
use aftermath_core::signals;
use aftermath_core::{CrashHandler, FatalSignal, FATAL_SIGNALS};
use aftermath_utils::{info, init_logging, warn};
use clap::{Parser, Subcommand, ValueEnum};

/// Crash drill for the Aftermath fatal-signal crash handler.
#[derive(Parser, Debug)]
#[command(name = "aftermath")]
#[command(version)]
#[command(about = "Install the crash handler and deliberately crash to verify it", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List the fatal signals the handler watches
    Signals,
    /// Install the crash handler, then raise a fatal signal
    Drill
    {
        /// Signal to raise (segv, abrt, fpe, bus, ill, quit)
        #[arg(short, long, default_value = "segv")]
        signal: FatalSignal,
        /// Directory for the crash log (overrides AFTERMATH_CRASH_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Message to record in the error section
        #[arg(short, long)]
        message: Option<String>,
        /// Add a report section that crashes while being produced
        #[arg(long, default_value_t = false)]
        faulty_section: bool,
        /// Make the emergency gate suppress the report
        #[arg(long, value_enum)]
        suppress: Option<Suppress>,
        /// Crash inside the emergency gate, outside any guarded section
        #[arg(long, default_value_t = false)]
        gate_fault: bool,
        /// Pretend a crash is already being handled
        #[arg(long, default_value_t = false)]
        preset_session: bool,
        /// Crash inside the cleanup run before exiting
        #[arg(long, default_value_t = false)]
        cleanup_fault: bool,
    },
}

/// Which emergency-gate predicate reports true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Suppress
{
    /// The active state is unsafe to introspect
    UnsafeState,
    /// Content the report depends on is missing
    MissingContent,
}

struct DrillGate
{
    suppress: Option<Suppress>,
    fault: bool,
}

impl EmergencyGate for DrillGate
{
    fn unsafe_state(&self) -> bool
    {
        if self.fault {
            signals::raise(FatalSignal::SegmentationViolation);
        }
        self.suppress == Some(Suppress::UnsafeState)
    }

    fn missing_content(&self) -> bool
    {
        self.suppress == Some(Suppress::MissingContent)
    }
}

/// A section that faults halfway through.
struct FaultySection;

impl ReportSection for FaultySection
{
    fn name(&self) -> &str
    {
        "faulty"
    }

    fn produce(&self, _context: &CrashContext<'_>, out: &mut String) -> bool
    {
        out.push_str("Faulty section:\n");
        signals::raise(FatalSignal::SegmentationViolation);
        out.push_str(" unreachable\n\n");
        true
    }
}

/// A section that always works; shows that production continues after a fault.
struct AfterFaultSection;

impl ReportSection for AfterFaultSection
{
    fn name(&self) -> &str
    {
        "after fault"
    }

    fn produce(&self, _context: &CrashContext<'_>, out: &mut String) -> bool
    {
        out.push_str("After fault:\n Report production continued.\n\n");
        true
    }
}

#[allow(clippy::struct_excessive_bools)] // one switch per drill scenario
struct DrillOptions
{
    signal: FatalSignal,
    output_dir: Option<PathBuf>,
    message: Option<String>,
    faulty_section: bool,
    suppress: Option<Suppress>,
    gate_fault: bool,
    preset_session: bool,
    cleanup_fault: bool,
}

fn main()
{
    // Initialize logging (reads from RUST_LOG env var)
    // Defaults to INFO level and Pretty format if not set
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {e}");
        process::exit(1);
    }

    let cli = Cli::parse();

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>>
{
    match cli.command {
        Commands::Signals => {
            for signal in FATAL_SIGNALS {
                println!("{:<8} {:>2}  {}", signal.name(), signal.raw(), signal_description(signal.raw()));
            }
            Ok(())
        }
        Commands::Drill {
            signal,
            output_dir,
            message,
            faulty_section,
            suppress,
            gate_fault,
            preset_session,
            cleanup_fault,
        } => run_drill(DrillOptions {
            signal,
            output_dir,
            message,
            faulty_section,
            suppress,
            gate_fault,
            preset_session,
            cleanup_fault,
        }),
    }
}

fn run_drill(options: DrillOptions) -> Result<(), Box<dyn std::error::Error>>
{
    let mut config = CrashConfig::from_env()?.with_app("aftermath drill", env!("CARGO_PKG_VERSION"));
    if let Some(dir) = options.output_dir {
        config = config.with_output_dir(dir);
    }

    let mut builder = CrashHandler::builder(config).gate(DrillGate {
        suppress: options.suppress,
        fault: options.gate_fault,
    });
    if options.faulty_section {
        builder = builder.section(FaultySection).section(AfterFaultSection);
    }
    let cleanup_fault = options.cleanup_fault;
    let builder = builder.cleanup(move || {
        eprintln!("Crash drill finished.");
        if cleanup_fault {
            signals::raise(FatalSignal::SegmentationViolation);
        }
    });
    aftermath_core::install(builder.build())?;

    if let Some(message) = options.message {
        aftermath_core::set_error_message(message);
    }
    if options.preset_session {
        warn!("Pre-setting the crash session; the handler will treat the signal as re-entry");
        CRASH_SESSION.create(options.signal.raw());
    }

    info!("Raising {}", options.signal);
    signals::raise(options.signal);

    Err(format!("{} was raised but the process is still running", options.signal).into())
}
