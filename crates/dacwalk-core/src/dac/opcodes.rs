//! Request identifiers understood by the data-access component.
//!
//! These numbers are fixed by the native side. They never leave the `dac` module:
//! callers go through the typed accessors on [`super::DacLibrary`].

use std::fmt;

/// One request the engine knows how to issue and decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DacRequest
{
    /// Protocol version, 4-byte response
    Version = 0xe000_0000,
    /// Thread store summary
    ThreadStore = 0xf000_0000,
    /// App domain store summary
    AppDomainStore = 0xf000_0001,
    /// App domain pointer list
    AppDomainList = 0xf000_0002,
    /// One app domain
    AppDomainData = 0xf000_0003,
    /// One runtime thread
    Thread = 0xf000_0011,
    /// One type descriptor
    MethodTable = 0xf000_001e,
    /// One runtime module
    ModuleData = 0xf000_0023,
    /// Aggregate GC configuration
    GcHeapData = 0xf000_0029,
    /// Server GC heap pointer list
    GcHeapList = 0xf000_002a,
    /// Details of one server GC heap
    GcHeapDetails = 0xf000_002b,
    /// Details of the workstation GC heap
    GcHeapStaticDetails = 0xf000_002c,
    /// One heap segment
    HeapSegment = 0xf000_002d,
    /// Well-known type handles
    UsefulGlobals = 0xf000_003b,
    /// Number of runtime module pointers
    ModuleCount = 0xf000_0050,
    /// Runtime module pointer list
    ModuleList = 0xf000_0051,
}

impl DacRequest
{
    /// Numeric request id sent to the native side
    #[must_use]
    pub const fn id(self) -> u32
    {
        self as u32
    }
}

impl fmt::Display for DacRequest
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{self:?} (0x{:08x})", self.id())
    }
}
