//! # Memory Dump Integration
//!
//! A full process memory dump is written by an external facility (a minidump
//! writer, for instance) behind [`CrashDumpWriter`]. The writer picks its own
//! scratch file; once it finishes, the completion callback moves that file to
//! the crash's `.dmp` name so it sits next to the crash log.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactNaming;
use crate::error::{CrashError, CrashResult};

/// Completion callback handed to a dump writer.
///
/// Called with the path the writer produced and whether writing succeeded.
/// Returns whether the dump is usable.
pub type DumpCompletion<'a> = dyn FnMut(&Path, bool) -> bool + 'a;

/// An external memory-dump facility.
pub trait CrashDumpWriter: Send + Sync
{
    /// Write a dump of the current process somewhere under `scratch_dir`,
    /// then call `on_complete` with its path and success.
    ///
    /// Returns the value `on_complete` returned, or `false` if the writer
    /// never got that far.
    fn write_dump(&self, scratch_dir: &Path, on_complete: &mut DumpCompletion<'_>) -> bool;
}

/// Write a dump and move it to `naming`'s `.dmp` path.
///
/// ## Errors
///
/// - `DumpFailed`: the writer reported failure, or the finished dump could
///   not be moved into place
pub fn write_crash_dump(writer: &dyn CrashDumpWriter, naming: &ArtifactNaming) -> CrashResult<PathBuf>
{
    let final_path: RefCell<Option<PathBuf>> = RefCell::new(None);
    let rename_error: RefCell<Option<String>> = RefCell::new(None);

    let mut on_complete = |written: &Path, succeeded: bool| {
        if !succeeded {
            return false;
        }
        let target = naming.path_for("dmp");
        match fs::rename(written, &target) {
            Ok(()) => {
                *final_path.borrow_mut() = Some(target);
                true
            }
            Err(err) => {
                *rename_error.borrow_mut() = Some(format!("{} -> {}: {err}", written.display(), target.display()));
                false
            }
        }
    };

    let succeeded = writer.write_dump(naming.dir(), &mut on_complete);

    if let Some(err) = rename_error.into_inner() {
        return Err(CrashError::DumpFailed(err));
    }
    match final_path.into_inner() {
        Some(path) if succeeded => Ok(path),
        _ => Err(CrashError::DumpFailed("dump writer reported failure".to_string())),
    }
}

#[cfg(test)]
mod tests
{
    use chrono::{TimeZone, Utc};

    use super::*;

    struct FakeWriter
    {
        succeed: bool,
    }

    impl CrashDumpWriter for FakeWriter
    {
        fn write_dump(&self, scratch_dir: &Path, on_complete: &mut DumpCompletion<'_>) -> bool
        {
            let scratch = scratch_dir.join("3f2a-scratch.dmp");
            fs::write(&scratch, b"MDMP").unwrap();
            on_complete(&scratch, self.succeed)
        }
    }

    struct AbandoningWriter;

    impl CrashDumpWriter for AbandoningWriter
    {
        fn write_dump(&self, _scratch_dir: &Path, _on_complete: &mut DumpCompletion<'_>) -> bool
        {
            false
        }
    }

    fn naming(dir: &Path) -> ArtifactNaming
    {
        ArtifactNaming::new(dir, Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
    }

    #[test]
    fn test_dump_is_renamed_into_place()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = write_crash_dump(&FakeWriter { succeed: true }, &naming(dir.path())).unwrap();

        assert_eq!(path, dir.path().join("crash-20240501-083000.dmp"));
        assert_eq!(fs::read(&path).unwrap(), b"MDMP");
        assert!(!dir.path().join("3f2a-scratch.dmp").exists());
    }

    #[test]
    fn test_failed_dump_is_reported()
    {
        let dir = tempfile::tempdir().unwrap();
        let err = write_crash_dump(&FakeWriter { succeed: false }, &naming(dir.path())).unwrap_err();
        assert!(matches!(err, CrashError::DumpFailed(_)));
        assert!(!dir.path().join("crash-20240501-083000.dmp").exists());
    }

    #[test]
    fn test_writer_that_never_completes()
    {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_crash_dump(&AbandoningWriter, &naming(dir.path())).is_err());
    }
}
