//! End-to-end crash drills.
//!
//! Each test runs the `aftermath` binary in a child process, lets it crash for
//! real, and checks the exit code and the files left behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn drill(dir: &Path, args: &[&str]) -> Output
{
    Command::new(env!("CARGO_BIN_EXE_aftermath"))
        .arg("drill")
        .arg("--output-dir")
        .arg(dir)
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("AFTERMATH_LOG_FILE")
        .env_remove("AFTERMATH_LOG_FORMAT")
        .env_remove("AFTERMATH_CRASH_DIR")
        .output()
        .expect("failed to spawn aftermath")
}

fn crash_logs(dir: &Path) -> Vec<PathBuf>
{
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut logs: Vec<PathBuf> = entries
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("crash-") && name.ends_with(".log")
        })
        .collect();
    logs.sort();
    logs
}

fn only_log(dir: &Path) -> String
{
    let logs = crash_logs(dir);
    assert_eq!(logs.len(), 1, "expected exactly one crash log, found {logs:?}");
    fs::read_to_string(&logs[0]).unwrap()
}

#[test]
fn test_every_fatal_signal_is_handled()
{
    for signal in ["segv", "abrt", "fpe", "bus", "ill", "quit"] {
        let dir = TempDir::new().unwrap();
        let output = drill(dir.path(), &["--signal", signal]);
        let stderr = String::from_utf8_lossy(&output.stderr);

        assert_eq!(output.status.code(), Some(2), "signal {signal}: {stderr}");
        assert!(stderr.contains("Crash encountered, generating crash log..."), "signal {signal}: {stderr}");
        assert!(stderr.contains("Crash drill finished."), "signal {signal}: {stderr}");

        let log = only_log(dir.path());
        assert!(log.starts_with("*** aftermath drill Crash Report ***"), "signal {signal}: {log}");
        assert!(log.contains("Crash reason:"));
        assert!(log.contains("Stacktrace:"));
        assert!(!log.contains("*** Failed to generate"), "signal {signal}: {log}");
    }
}

#[test]
fn test_report_sections_are_in_order()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--signal", "segv", "--message", "drill message"]);
    assert_eq!(output.status.code(), Some(2));

    let log = only_log(dir.path());
    let header = log.find("Crash at:").unwrap();
    let os = log.find("Operating system:").or_else(|| log.find("Could not get OS version")).unwrap();
    let reason = log.find("Crash reason:").unwrap();
    let stack = log.find("Stacktrace:").unwrap();
    assert!(header < os && os < reason && reason < stack);
    assert!(log.contains(" Message: drill message"));
    // SIGSEGV is 11 on every supported target.
    assert!(log.contains("(11)"));
}

#[test]
fn test_unsafe_state_suppresses_the_report()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--suppress", "unsafe-state"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(3), "{stderr}");
    assert!(stderr.contains("emergency state"));
    assert!(!stderr.contains("Crash encountered"));
    assert!(crash_logs(dir.path()).is_empty());
}

#[test]
fn test_missing_content_suppresses_the_report()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--signal", "abrt", "--suppress", "missing-content"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(3), "{stderr}");
    assert!(stderr.contains("Content required by the active state is missing"));
    assert!(crash_logs(dir.path()).is_empty());
}

#[test]
fn test_faulty_section_is_marked_and_production_continues()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--faulty-section"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2), "{stderr}");
    assert!(stderr.contains("Something went wrong when attempting to fill the faulty section of the crash log."));

    let log = only_log(dir.path());
    let marker = log.find("*** Failed to generate the faulty section ***").unwrap();
    let after = log.find("Report production continued.").unwrap();
    assert!(marker < after);
    assert!(!log.contains("Faulty section:"), "partial output leaked: {log}");
    assert!(!log.contains("unreachable"));
}

#[test]
fn test_fault_outside_guard_is_a_double_fault()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--gate-fault"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1), "{stderr}");
    assert!(stderr.contains("Something went seriously wrong when creating the crash log. Aborting."));
    assert!(!stderr.contains("Crash encountered"));
    assert!(!stderr.contains("Crash drill finished."));
    assert!(crash_logs(dir.path()).is_empty());
}

#[test]
fn test_fault_in_cleanup_is_a_double_fault()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--signal", "abrt", "--cleanup-fault"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1), "{stderr}");
    assert!(stderr.contains("Something went seriously wrong when creating the crash log. Aborting."));
    // Cleanup runs once; the double-fault exit does not repeat it.
    assert_eq!(stderr.matches("Crash drill finished.").count(), 1, "{stderr}");

    // The report was written before cleanup started.
    let log = only_log(dir.path());
    assert!(log.contains("Crash reason:"));
}

#[test]
fn test_existing_session_exits_without_report()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--preset-session"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(2), "{stderr}");
    assert!(!stderr.contains("Crash encountered"));
    assert!(crash_logs(dir.path()).is_empty());
}

#[test]
fn test_repeated_drills_do_not_overwrite_logs()
{
    let dir = TempDir::new().unwrap();
    for _ in 0..2 {
        assert_eq!(drill(dir.path(), &[]).status.code(), Some(2));
    }
    assert_eq!(crash_logs(dir.path()).len(), 2);
}

#[test]
fn test_unknown_signal_is_rejected()
{
    let dir = TempDir::new().unwrap();
    let output = drill(dir.path(), &["--signal", "sigusr1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown fatal signal"));
    assert!(crash_logs(dir.path()).is_empty());
}

#[test]
fn test_signals_command_lists_fatal_set()
{
    let output = Command::new(env!("CARGO_BIN_EXE_aftermath"))
        .arg("signals")
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["SIGSEGV", "SIGABRT", "SIGFPE", "SIGBUS", "SIGILL", "SIGQUIT"] {
        assert!(stdout.contains(name), "{name} missing from:\n{stdout}");
    }
}
