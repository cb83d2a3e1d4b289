//! Build-time configuration shared by the device tree and I2C binding crates.
//!
//! The constants are generated by `build.rs` from `flags.json` at the workspace root.
//! The file has one table per constant type (`u32`, `usize`, `str`).

#![no_std]
#![deny(warnings)]

/// Constants generated from `flags.json`.
#[allow(missing_docs)]
pub mod build_flags {
    include!(concat!(env!("OUT_DIR"), "/build_flags.rs"));
}

pub use build_flags::*;
