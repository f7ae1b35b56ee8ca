//! # Crash Artifacts
//!
//! Where the report text ends up. The core only guarantees the text handed to
//! an [`ArtifactSink`] is complete and ordered; choosing a path and writing it
//! is the sink's business. [`FileSink`] is the default sink.
//!
//! [`ArtifactNaming`] gives every artifact of one crash the same
//! timestamp-derived stem (`crash-20240131-235959.log`,
//! `crash-20240131-235959.dmp`) and never reuses an existing path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{CrashError, CrashResult};
use crate::report::CrashReport;

/// Receives the finished report.
pub trait ArtifactSink: Send + Sync
{
    /// Persist `report` and return where it went.
    ///
    /// ## Errors
    ///
    /// Any error is reported on the console and the crash is still handled.
    fn persist(&self, report: &CrashReport) -> CrashResult<PathBuf>;
}

/// Deterministic, collision-free artifact paths for one crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming
{
    dir: PathBuf,
    stem: String,
}

impl ArtifactNaming
{
    /// Names for a crash observed at `crashed_at`, placed in `dir`.
    pub fn new(dir: impl Into<PathBuf>, crashed_at: DateTime<Utc>) -> Self
    {
        Self {
            dir: dir.into(),
            stem: format!("crash-{}", crashed_at.format("%Y%m%d-%H%M%S")),
        }
    }

    /// Directory artifacts are placed in.
    pub fn dir(&self) -> &Path
    {
        &self.dir
    }

    /// First free path with `extension`: `<stem>.<ext>`, then `<stem>-1.<ext>`, ...
    pub fn path_for(&self, extension: &str) -> PathBuf
    {
        let mut candidate = self.dir.join(format!("{}.{extension}", self.stem));
        let mut suffix = 1u32;
        while candidate.exists() {
            candidate = self.dir.join(format!("{}-{suffix}.{extension}", self.stem));
            suffix += 1;
        }
        candidate
    }
}

/// Writes the report to `<output_dir>/crash-<timestamp>.log`.
#[derive(Debug, Clone)]
pub struct FileSink
{
    output_dir: PathBuf,
}

impl FileSink
{
    /// A sink writing into `output_dir`, which is created if missing.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self
    {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ArtifactSink for FileSink
{
    fn persist(&self, report: &CrashReport) -> CrashResult<PathBuf>
    {
        fs::create_dir_all(&self.output_dir)?;
        let path = ArtifactNaming::new(&self.output_dir, report.crashed_at).path_for("log");

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| CrashError::PersistFailed(format!("{}: {err}", path.display())))?;
        file.write_all(report.text().as_bytes())?;
        file.sync_all()?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests
{
    use chrono::TimeZone;

    use super::*;
    use crate::report::SectionResult;

    fn crash_time() -> DateTime<Utc>
    {
        Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 58).unwrap()
    }

    #[test]
    fn test_naming_is_deterministic()
    {
        let dir = tempfile::tempdir().unwrap();
        let naming = ArtifactNaming::new(dir.path(), crash_time());
        assert_eq!(naming.path_for("log"), dir.path().join("crash-20240131-235958.log"));
        assert_eq!(naming.path_for("dmp"), dir.path().join("crash-20240131-235958.dmp"));
        assert_eq!(naming.path_for("log"), naming.path_for("log"));
    }

    #[test]
    fn test_naming_avoids_collisions()
    {
        let dir = tempfile::tempdir().unwrap();
        let naming = ArtifactNaming::new(dir.path(), crash_time());

        fs::write(naming.path_for("log"), "old").unwrap();
        assert_eq!(naming.path_for("log"), dir.path().join("crash-20240131-235958-1.log"));

        fs::write(naming.path_for("log"), "older").unwrap();
        assert_eq!(naming.path_for("log"), dir.path().join("crash-20240131-235958-2.log"));
    }

    #[test]
    fn test_file_sink_writes_report()
    {
        let dir = tempfile::tempdir().unwrap();
        let report = CrashReport {
            crashed_at: crash_time(),
            sections: vec![SectionResult::succeeded("header", "*** Crash Report ***\n".to_string())],
        };

        let sink = FileSink::new(dir.path().join("nested"));
        let first = sink.persist(&report).unwrap();
        assert_eq!(fs::read_to_string(&first).unwrap(), "*** Crash Report ***\n");

        // A second crash in the same second must not clobber the first log.
        let second = sink.persist(&report).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
    }
}
