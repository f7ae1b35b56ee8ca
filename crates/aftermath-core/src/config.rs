//! # Configuration
//!
//! Settings for crash handling, with environment overrides.
//!
//! ## Environment Variables
//!
//! - `AFTERMATH_CRASH_DIR`: Directory crash logs and dumps are written to (default: OS temp dir)
//! - `AFTERMATH_STACK_DEPTH`: Maximum captured stack frames (default: 64)
//! - `AFTERMATH_CRASH_DUMP`: Set to `0`, `false`, `no` or `off` to skip memory dumps

use std::env;
use std::path::PathBuf;

use crate::error::{CrashError, CrashResult};
use crate::stacktrace::{DEFAULT_MAX_DEPTH, MAX_DEPTH};

/// Crash handler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashConfig
{
    /// Application name shown in the report header
    pub app_name: String,
    /// Application version shown in the report header
    pub app_version: String,
    /// Where artifacts are written
    pub output_dir: PathBuf,
    /// Maximum number of stack frames to capture
    pub stack_depth: usize,
    /// Whether to ask the dump writer (if any) for a memory dump
    pub write_dump: bool,
}

impl Default for CrashConfig
{
    fn default() -> Self
    {
        Self {
            app_name: "aftermath".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            output_dir: env::temp_dir(),
            stack_depth: DEFAULT_MAX_DEPTH,
            write_dump: true,
        }
    }
}

impl CrashConfig
{
    /// Defaults, overridden by the process environment.
    ///
    /// ## Errors
    ///
    /// - `InvalidConfig`: a variable is set to an unparseable value
    pub fn from_env() -> CrashResult<Self>
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for each variable.
    ///
    /// ## Errors
    ///
    /// - `InvalidConfig`: a variable is set to an unparseable value
    pub fn from_lookup<F>(lookup: F) -> CrashResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("AFTERMATH_CRASH_DIR").filter(|dir| !dir.is_empty()) {
            config.output_dir = PathBuf::from(dir);
        }

        if let Some(depth) = lookup("AFTERMATH_STACK_DEPTH") {
            config.stack_depth = match depth.trim().parse::<usize>() {
                Ok(depth) if (1..=MAX_DEPTH).contains(&depth) => depth,
                _ => {
                    return Err(CrashError::InvalidConfig(format!(
                        "AFTERMATH_STACK_DEPTH must be a positive integer up to {MAX_DEPTH}, got '{depth}'"
                    )))
                }
            };
        }

        if let Some(flag) = lookup("AFTERMATH_CRASH_DUMP") {
            config.write_dump = parse_flag(&flag).ok_or_else(|| {
                CrashError::InvalidConfig(format!("AFTERMATH_CRASH_DUMP must be a boolean, got '{flag}'"))
            })?;
        }

        Ok(config)
    }

    /// Set the name and version shown in the report header.
    #[must_use]
    pub fn with_app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self
    {
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }

    /// Set the artifact directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self
    {
        self.output_dir = dir.into();
        self
    }
}

fn parse_flag(value: &str) -> Option<bool>
{
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
