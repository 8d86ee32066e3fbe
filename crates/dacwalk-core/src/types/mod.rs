//! # Types
//!
//! Records produced by the introspection engine.
//!
//! Everything here is a plain value decoded from the target at one point in time.
//! None of these types hold a connection back to the target process.

pub mod address;
pub mod architecture;
pub mod domain;
pub mod heap;
pub mod module;
pub mod root;
pub mod thread;

// Re-export all public types
pub use address::Address;
pub use architecture::Architecture;
pub use domain::{AppDomain, AppDomainStore};
pub use heap::{
    CommonMethodTables, GcHeapSummary, GcInfoRecord, GenerationData, HeapDetails, HeapSegment, MethodTableRecord,
    SegmentRecord,
};
pub use module::{ModuleData, ModuleRecord, RuntimeModule};
pub use root::{HandleKind, Root, RootKind};
pub use thread::{ThreadRecord, ThreadStoreSummary};
