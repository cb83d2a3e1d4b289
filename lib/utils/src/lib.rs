#![no_std]
extern crate alloc;

pub mod handle;
pub mod macros;

#[doc(hidden)]
pub use log as __log;
