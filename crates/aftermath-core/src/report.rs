//! Report data: the context sections render from, the per-section results,
//! and the assembled report text.

use chrono::{DateTime, Utc};
use libc::c_int;

use crate::config::CrashConfig;

/// Everything a section may look at while rendering.
#[derive(Debug, Clone, Copy)]
pub struct CrashContext<'a>
{
    /// Signal that triggered crash handling.
    pub signal: c_int,
    /// Optional free-text message supplied by the application.
    pub message: Option<&'a str>,
    /// Active configuration.
    pub config: &'a CrashConfig,
    /// When the crash was observed.
    pub crashed_at: DateTime<Utc>,
}

impl<'a> CrashContext<'a>
{
    /// Build a context stamped with the current time.
    pub fn new(signal: c_int, message: Option<&'a str>, config: &'a CrashConfig) -> Self
    {
        Self {
            signal,
            message,
            config,
            crashed_at: Utc::now(),
        }
    }
}

/// One report-producing step.
///
/// Producers are run through [`crate::guard::run_guarded`]; a fault inside
/// `produce` marks the section failed and the next section still runs.
pub trait ReportSection: Send + Sync
{
    /// Short name used in failure markers and console output.
    fn name(&self) -> &str;

    /// Append this section's text to `out`.
    ///
    /// Returns `false` if the section could not be produced. Graceful
    /// degradation (a fallback line) is still success.
    fn produce(&self, context: &CrashContext<'_>, out: &mut String) -> bool;
}

/// Output of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionResult
{
    /// Section name.
    pub name: String,
    /// Rendered text, or the failure marker if the section failed.
    pub text: String,
    /// Whether the producer completed successfully.
    pub succeeded: bool,
}

impl SectionResult
{
    /// A successfully produced section.
    pub fn succeeded(name: impl Into<String>, text: String) -> Self
    {
        Self {
            name: name.into(),
            text,
            succeeded: true,
        }
    }

    /// A failed section, carrying its failure marker as text.
    pub fn failed(name: impl Into<String>) -> Self
    {
        let name = name.into();
        let text = failure_marker(&name);
        Self {
            name,
            text,
            succeeded: false,
        }
    }
}

/// Text that replaces a failed section in the report.
pub fn failure_marker(section: &str) -> String
{
    format!("*** Failed to generate the {section} section ***\n\n")
}

/// The assembled crash report.
#[derive(Debug, Clone)]
pub struct CrashReport
{
    /// When the crash was observed; artifact names derive from it.
    pub crashed_at: DateTime<Utc>,
    /// Sections in production order.
    pub sections: Vec<SectionResult>,
}

impl CrashReport
{
    /// The full report text, sections in order.
    pub fn text(&self) -> String
    {
        self.sections.iter().map(|section| section.text.as_str()).collect()
    }

    /// Names of the sections that failed.
    pub fn failed_sections(&self) -> Vec<&str>
    {
        self.sections
            .iter()
            .filter(|section| !section.succeeded)
            .map(|section| section.name.as_str())
            .collect()
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&SectionResult>
    {
        self.sections.iter().find(|section| section.name == name)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_report_text_keeps_order()
    {
        let report = CrashReport {
            crashed_at: Utc::now(),
            sections: vec![
                SectionResult::succeeded("a", "first\n".to_string()),
                SectionResult::failed("b"),
                SectionResult::succeeded("c", "third\n".to_string()),
            ],
        };

        let text = report.text();
        let first = text.find("first").unwrap();
        let marker = text.find("Failed to generate the b section").unwrap();
        let third = text.find("third").unwrap();
        assert!(first < marker && marker < third);
        assert_eq!(report.failed_sections(), vec!["b"]);
        assert!(report.section("c").unwrap().succeeded);
        assert!(report.section("missing").is_none());
    }
}
