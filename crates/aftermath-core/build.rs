//! Build script for aftermath-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (workspace lints need Rust 1.74.0+)
//! - Target platform (signal handling is Unix-only)
//!
//! ## Requirements
//!
//! - **Rust**: 1.74.0 or newer
//! - **Target**: any Unix; stack traces additionally need glibc

fn main()
{
    // Check minimum Rust version
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 74, 0);

        if rustc_version < min_rust_version {
            panic!(
                "aftermath-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // The build script runs on the host, so ask cargo about the target.
    let family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    if !family.split(',').any(|f| f == "unix") {
        panic!("aftermath-core only supports Unix targets, found target family '{family}'");
    }

    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if target_env != "gnu" {
        println!("cargo:warning=stack traces need glibc; crash reports on this target will say 'Not supported.'");
    }
}
