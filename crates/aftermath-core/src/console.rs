//! Raw stderr output for contexts where nothing else can be trusted.

/// Write `message` straight to file descriptor 2.
///
/// Uses only `write(2)`, which is async-signal-safe. No locking, no
/// allocation, no formatting. Partial writes are not retried.
pub fn write_stderr(message: &str)
{
    unsafe {
        let _ = libc::write(libc::STDERR_FILENO, message.as_ptr().cast(), message.len());
    }
}
