//! # Log Assembler
//!
//! Produces the crash report from an ordered list of sections, each run
//! through [`run_guarded`]. A section that fails contributes a failure marker
//! in its place; later sections still run, in order.

use std::mem;

use crate::guard::run_guarded;
use crate::report::{CrashContext, CrashReport, ReportSection, SectionResult};
use crate::sections::{ErrorReasonSection, HeaderSection, OsVersionSection, StacktraceSection};
use crate::session::CrashSession;

/// Ordered collection of report sections.
pub struct LogAssembler
{
    sections: Vec<Box<dyn ReportSection>>,
}

impl LogAssembler
{
    /// An assembler running exactly `sections`, in order.
    pub fn new(sections: Vec<Box<dyn ReportSection>>) -> Self
    {
        Self { sections }
    }

    /// The fixed sections: header, OS version, error reason, stack trace.
    pub fn standard() -> Self
    {
        Self::new(vec![
            Box::new(HeaderSection),
            Box::new(OsVersionSection::default()),
            Box::new(ErrorReasonSection),
            Box::new(StacktraceSection::default()),
        ])
    }

    /// Append a section after the ones already present.
    #[must_use]
    pub fn with_section(mut self, section: impl ReportSection + 'static) -> Self
    {
        self.sections.push(Box::new(section));
        self
    }

    /// Append a boxed section after the ones already present.
    pub fn push(&mut self, section: Box<dyn ReportSection>)
    {
        self.sections.push(section);
    }

    /// Section names in production order.
    pub fn section_names(&self) -> Vec<&str>
    {
        self.sections.iter().map(|section| section.name()).collect()
    }

    /// Produce every section under `session`.
    pub fn assemble(&self, session: &CrashSession, context: &CrashContext<'_>) -> CrashReport
    {
        let sections = self
            .sections
            .iter()
            .map(|section| {
                let name = section.name();
                let mut fragment = String::new();
                let ok = run_guarded(session, name, || section.produce(context, &mut fragment));
                if ok {
                    SectionResult::succeeded(name, fragment)
                } else {
                    // The producer may have been interrupted mid-write; don't
                    // even run its destructor.
                    mem::forget(fragment);
                    SectionResult::failed(name)
                }
            })
            .collect();

        CrashReport {
            crashed_at: context.crashed_at,
            sections,
        }
    }
}

impl Default for LogAssembler
{
    fn default() -> Self
    {
        Self::standard()
    }
}

impl std::fmt::Debug for LogAssembler
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("LogAssembler")
            .field("sections", &self.section_names())
            .finish()
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::config::CrashConfig;
    use crate::session::SessionSlot;

    struct Probe
    {
        name: &'static str,
        ok: bool,
        order: Arc<AtomicUsize>,
        seen_at: Arc<AtomicUsize>,
    }

    impl ReportSection for Probe
    {
        fn name(&self) -> &str
        {
            self.name
        }

        fn produce(&self, _context: &CrashContext<'_>, out: &mut String) -> bool
        {
            self.seen_at.store(self.order.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
            out.push_str(self.name);
            out.push('\n');
            self.ok
        }
    }

    fn probe(name: &'static str, ok: bool, order: &Arc<AtomicUsize>) -> (Probe, Arc<AtomicUsize>)
    {
        let seen_at = Arc::new(AtomicUsize::new(0));
        (
            Probe {
                name,
                ok,
                order: Arc::clone(order),
                seen_at: Arc::clone(&seen_at),
            },
            seen_at,
        )
    }

    #[test]
    fn test_standard_order()
    {
        let assembler = LogAssembler::standard();
        assert_eq!(assembler.section_names(), vec!["header", "OS version", "error", "stacktrace"]);
    }

    #[test]
    fn test_standard_report_renders()
    {
        let slot = SessionSlot::new();
        let session = slot.create(libc::SIGILL);
        let config = CrashConfig::default();
        let context = CrashContext::new(session.signal(), None, &config);

        let report = LogAssembler::standard().assemble(session, &context);
        assert!(report.failed_sections().is_empty());

        let text = report.text();
        let header = text.find("Crash Report").unwrap();
        let os = text.find("Operating system:").unwrap();
        let reason = text.find("Crash reason:").unwrap();
        let stack = text.find("Stacktrace:").unwrap();
        assert!(header < os && os < reason && reason < stack);
    }

    #[test]
    fn test_failed_section_is_marked_and_later_sections_run()
    {
        let slot = SessionSlot::new();
        let session = slot.create(libc::SIGSEGV);
        let config = CrashConfig::default();
        let context = CrashContext::new(session.signal(), None, &config);

        let order = Arc::new(AtomicUsize::new(0));
        let (first, first_at) = probe("first", true, &order);
        let (broken, broken_at) = probe("broken", false, &order);
        let (last, last_at) = probe("last", true, &order);

        let report = LogAssembler::new(Vec::new())
            .with_section(first)
            .with_section(broken)
            .with_section(last)
            .assemble(session, &context);

        assert_eq!(first_at.load(Ordering::SeqCst), 1);
        assert_eq!(broken_at.load(Ordering::SeqCst), 2);
        assert_eq!(last_at.load(Ordering::SeqCst), 3);

        assert_eq!(report.failed_sections(), vec!["broken"]);
        assert!(report.section("last").unwrap().succeeded);
        assert!(!session.is_guard_active());

        let text = report.text();
        assert!(text.contains("*** Failed to generate the broken section ***"));
        assert!(!text.contains("broken\n"));
        assert!(text.ends_with("last\n"));
    }
}
