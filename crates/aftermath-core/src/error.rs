//! # Error Types
//!
//! Errors for the setup side of crash handling.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Nothing in here ever crosses a signal handler boundary. Once a fatal signal
//! is being handled, failures become structural outcomes instead: a section is
//! marked failed, or the process terminates with a specific exit code (see
//! [`crate::gate::Outcome`]).

use thiserror::Error;

/// Main error type for crash handler operations
///
/// ## Error Categories
///
/// 1. **Installation errors**: InstallFailed, AlreadyInstalled
/// 2. **Configuration errors**: InvalidConfig
/// 3. **Collaborator errors**: PersistFailed, DumpFailed
/// 4. **I/O errors**: Io (for file operations, etc.)
#[derive(Error, Debug)]
pub enum CrashError
{
    /// Installing a signal disposition or an alternate signal stack failed
    ///
    /// `sigaction(2)` only fails for invalid signal numbers or bad pointers,
    /// so in practice this shows up when `sigaltstack(2)` or `mmap(2)` is
    /// refused by the kernel.
    #[error("Failed to install handler for {signal}: {source}")]
    InstallFailed
    {
        /// What was being installed (a signal name or "alternate stack")
        signal: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// A crash handler has already been installed for this process
    ///
    /// Handler installation is a one-way commitment for the process lifetime.
    #[error("Crash handler is already installed")]
    AlreadyInstalled,

    /// A configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The artifact sink could not persist the report
    #[error("Failed to persist crash log: {0}")]
    PersistFailed(String),

    /// The memory dump writer reported failure
    #[error("Failed to write crash dump: {0}")]
    DumpFailed(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, CrashError>`
///
/// ```rust
/// use aftermath_core::error::CrashResult;
/// fn foo() -> CrashResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type CrashResult<T> = std::result::Result<T, CrashError>;
