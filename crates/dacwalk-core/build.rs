//! Build script for dacwalk-core
//!
//! Checks build requirements before compilation:
//! - Minimum Rust version (C string literals in the FFI tests need Rust 1.77.0+)
//! - Host pointer width (target addresses are always 64-bit)

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 77, 0);

        if rustc_version < min_rust_version {
            panic!("dacwalk-core requires Rust {min_rust_version} or newer, found {rustc_version}");
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // Addresses are carried as u64 everywhere, but a 32-bit host cannot map large
    // responses from a 64-bit target.
    if std::env::var("CARGO_CFG_TARGET_POINTER_WIDTH").is_ok_and(|width| width != "64") {
        println!("cargo:warning=dacwalk-core on a 32-bit host can only inspect small 64-bit targets");
    }
}
