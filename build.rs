//! Build script - copies the linker script into the output directory
//! so that the linker can find it at link time.
//!
//! BLE builds place the application after the SoftDevice S140, so they
//! use `memory-s140.x`; USB builds own the whole flash and use `memory.x`.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let script = if env::var_os("CARGO_FEATURE_BLE").is_some() {
        "memory-s140.x"
    } else {
        "memory.x"
    };

    // Copy the selected script to OUT_DIR under the name cortex-m-rt expects
    fs::copy(script, out_dir.join("memory.x")).unwrap();

    // Tell cargo to look for linker scripts in OUT_DIR
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Firmware link scripts (cortex-m-rt, defmt); host test builds skip these.
    if env::var_os("CARGO_FEATURE_EMBEDDED").is_some() {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    // Rebuild if a linker script changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=memory-s140.x");
    println!("cargo:rerun-if-changed=build.rs");
}
