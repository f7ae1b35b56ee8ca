//! Platform queries used while assembling a report.

use std::ffi::CStr;
use std::io;
use std::mem;

use libc::{c_char, c_int};

/// Operating system identification as reported by `uname(2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemName
{
    /// Kernel name, e.g. `Linux`.
    pub sysname: String,
    /// Kernel release.
    pub release: String,
    /// Kernel version string.
    pub version: String,
    /// Hardware architecture, e.g. `x86_64`.
    pub machine: String,
}

/// Query the running system's identification.
///
/// ## Errors
///
/// Returns the OS error if `uname(2)` fails.
pub fn uname() -> io::Result<SystemName>
{
    unsafe {
        let mut name: libc::utsname = mem::zeroed();
        if libc::uname(&mut name) < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(SystemName {
            sysname: field(&name.sysname),
            release: field(&name.release),
            version: field(&name.version),
            machine: field(&name.machine),
        })
    }
}

fn field(raw: &[c_char]) -> String
{
    // utsname fields are NUL-terminated inside their fixed-size arrays.
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Human-readable description of a signal, e.g. `Segmentation fault`.
pub fn signal_description(signum: c_int) -> String
{
    unsafe {
        let description = libc::strsignal(signum);
        if description.is_null() {
            return format!("Unknown signal {signum}");
        }
        CStr::from_ptr(description).to_string_lossy().into_owned()
    }
}
