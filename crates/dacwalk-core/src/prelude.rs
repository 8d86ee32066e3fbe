//! Common module for library exports

pub use crate::config::{RuntimeOptions, RuntimeOptionsBuilder};
pub use crate::dac::accessors::INVALID_TYPE_HANDLE;
pub use crate::dac::{DacCapabilities, DacChannel, DacLibrary, RawHandle, RawStackRoot, RawStaticRoot, RequestError, RootTraversal};
pub use crate::error::{DacError, Result};
pub use crate::runtime::ClrRuntime;
pub use crate::target::DataTarget;
pub use crate::types::{
    Address, AppDomain, Architecture, GcHeapSummary, HandleKind, HeapSegment, MethodTableRecord, ModuleRecord, Root,
    RootKind, RuntimeModule, SegmentRecord, ThreadRecord,
};
