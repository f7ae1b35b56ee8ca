//! Tests for report assembly through the public API

use std::fs;

use aftermath_core::prelude::*;
use aftermath_core::sections::OsVersionSection;
use aftermath_core::session::SessionSlot;
use aftermath_core::stacktrace::UnsupportedWalker;

struct Counters;

impl ReportSection for Counters
{
    fn name(&self) -> &str
    {
        "counters"
    }

    fn produce(&self, context: &CrashContext<'_>, out: &mut String) -> bool
    {
        out.push_str(&format!("Counters:\n signal: {}\n\n", context.signal));
        true
    }
}

struct Unavailable;

impl ReportSection for Unavailable
{
    fn name(&self) -> &str
    {
        "network state"
    }

    fn produce(&self, _context: &CrashContext<'_>, out: &mut String) -> bool
    {
        out.push_str("partial");
        false
    }
}

#[test]
fn test_collaborator_sections_keep_their_order()
{
    let slot = SessionSlot::new();
    let session = slot.create(libc::SIGQUIT);
    let config = CrashConfig::default();
    let context = CrashContext::new(session.signal(), Some("operator requested quit"), &config);

    let report = LogAssembler::standard()
        .with_section(Unavailable)
        .with_section(Counters)
        .assemble(session, &context);

    let names: Vec<&str> = report.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["header", "OS version", "error", "stacktrace", "network state", "counters"]
    );
    assert_eq!(report.failed_sections(), vec!["network state"]);

    let text = report.text();
    assert!(text.contains(" Message: operator requested quit\n"));
    assert!(text.contains("*** Failed to generate the network state section ***"));
    assert!(!text.contains("partial"));
    assert!(text.ends_with(&format!("Counters:\n signal: {}\n\n", libc::SIGQUIT)));
}

#[test]
fn test_report_reaches_file_sink()
{
    let dir = tempfile::tempdir().unwrap();
    let slot = SessionSlot::new();
    let session = slot.create(libc::SIGSEGV);
    let config = CrashConfig::default().with_output_dir(dir.path());
    let context = CrashContext::new(session.signal(), None, &config);

    let report = LogAssembler::new(vec![
        Box::new(aftermath_core::sections::HeaderSection),
        Box::new(OsVersionSection::default()),
        Box::new(aftermath_core::sections::StacktraceSection::with_walker(UnsupportedWalker)),
    ])
    .assemble(session, &context);

    let path = FileSink::new(&config.output_dir).persist(&report).unwrap();
    assert_eq!(path.extension().unwrap(), "log");
    assert!(path.starts_with(dir.path()));

    let written = fs::read_to_string(path).unwrap();
    assert_eq!(written, report.text());
    assert!(written.contains("Stacktrace:\n Not supported.\n"));
}
