//! # dacwalk-core
//!
//! Out-of-process introspection of a managed runtime through its native data-access
//! component (DAC).
//!
//! Given raw memory access to a target (a suspended process or a dump) and a channel
//! to the DAC that matches the target's runtime, this crate reconstructs:
//!
//! - the runtime's loaded modules, correlated with the OS loader's list
//! - the runtime thread list
//! - GC heap details, segments and type descriptors
//! - GC roots: stack slots, static fields and handle table entries
//!
//! ## Layers
//!
//! - [`target::DataTarget`]: the raw memory collaborator, implemented by the host
//! - [`dac`]: the request channel, version negotiation and typed accessors
//! - [`modules`], the thread walker and the root walkers: the algorithms
//! - [`ClrRuntime`]: the facade with lazy caches
//!
//! ## Why unsafe code is needed
//!
//! The DAC is a native library. [`dac::ffi::NativeDac`] calls through a C ABI function
//! table and receives callbacks from native code. Those calls are wrapped in safe
//! abstractions; nothing else in the crate uses `unsafe`.

#![allow(unsafe_code)] // Required for the native DAC binding

pub mod config;
pub mod dac;
pub mod error;
pub mod modules;
pub mod prelude;
mod roots;
pub mod runtime;
pub mod target;
pub(crate) mod threads;
pub mod types;

pub use config::RuntimeOptions;
pub use error::{DacError, Result};
pub use runtime::ClrRuntime;
