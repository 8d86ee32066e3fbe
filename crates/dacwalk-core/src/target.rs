//! # Data Target
//!
//! The raw memory and process access the engine consumes.
//!
//! Attaching to a live process or opening a dump file is someone else's job. The
//! engine only needs the narrow view below: read bytes, list the loader's modules,
//! fetch one thread's register state, know the architecture, and optionally turn an
//! address into a symbol name.
//!
//! ## Implementations
//!
//! - A live-process reader (e.g. `ReadProcessMemory`/`GetThreadContext` on Windows)
//! - A minidump reader
//! - Scripted stubs in tests
//!
//! The target is assumed to be frozen for the whole session (a suspended process or
//! a dump), so nothing here deals with concurrent mutation.

use crate::error::Result;
use crate::types::{Address, Architecture, ModuleRecord};

/// Raw memory and process access for one target
///
/// All methods take `&self`; the engine never mutates the target.
pub trait DataTarget
{
    /// CPU architecture of the target process
    fn architecture(&self) -> Architecture;

    /// Read `len` bytes starting at `address`
    ///
    /// ## Errors
    ///
    /// - `ReadFailed`: The range is not (fully) readable
    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>;

    /// Modules reported by the OS loader, in any order
    fn enumerate_modules(&self) -> Vec<ModuleRecord>;

    /// Fill a register context for one OS thread
    ///
    /// `flags` selects the register groups (`CONTEXT_ALL` for the architecture) and
    /// `size` is the exact buffer size the data-access component expects.
    ///
    /// ## Errors
    ///
    /// - `ReadFailed`: The thread's register state is not available
    fn thread_context(&self, os_thread_id: u32, flags: u32, size: usize) -> Result<Vec<u8>>;

    /// Resolve an address to a symbol name
    ///
    /// The default implementation resolves nothing.
    fn resolve_symbol(&self, _address: Address) -> Option<String>
    {
        None
    }

    /// Size of a target pointer in bytes
    fn pointer_size(&self) -> usize
    {
        self.architecture().pointer_size()
    }

    /// Check whether one pointer-sized slot at `address` is readable
    fn is_readable(&self, address: Address) -> bool
    {
        self.read_memory(address, self.pointer_size()).is_ok()
    }
}
