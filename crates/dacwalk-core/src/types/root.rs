//! GC root types.

use std::fmt;

use super::Address;

/// Where a root was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind
{
    /// A stack slot or register in a managed frame
    Stack,
    /// A static field
    Static,
    /// A handle table entry
    Handle,
}

impl fmt::Display for RootKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            RootKind::Stack => write!(f, "stack"),
            RootKind::Static => write!(f, "static"),
            RootKind::Handle => write!(f, "handle"),
        }
    }
}

/// Handle table entry types, numbered as the runtime numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind
{
    /// Weak handle that does not track resurrection
    WeakShort,
    /// Weak handle that tracks resurrection
    WeakLong,
    /// Strong handle
    Strong,
    /// Strong handle that also pins its object
    Pinned,
    /// Handle whose strength is chosen at runtime
    Variable,
    /// COM reference-counted handle
    RefCounted,
    /// Keeps a secondary object alive while the primary is alive
    Dependent,
    /// Pinned handle used by overlapped I/O
    AsyncPinned,
    /// Strong handle that tracks the size of its object graph
    SizedRef,
    /// A value this engine does not know
    Unknown(u32),
}

impl HandleKind
{
    /// Decode the runtime's numeric handle type
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self
    {
        match raw {
            0 => HandleKind::WeakShort,
            1 => HandleKind::WeakLong,
            2 => HandleKind::Strong,
            3 => HandleKind::Pinned,
            4 => HandleKind::Variable,
            5 => HandleKind::RefCounted,
            6 => HandleKind::Dependent,
            7 => HandleKind::AsyncPinned,
            8 => HandleKind::SizedRef,
            other => HandleKind::Unknown(other),
        }
    }

    /// Handles of this kind keep their object alive
    ///
    /// Ref-counted handles are only strong while their count is non-zero; that is
    /// checked separately by the handle walker.
    #[must_use]
    pub const fn is_strong(self) -> bool
    {
        matches!(
            self,
            HandleKind::Strong
                | HandleKind::Pinned
                | HandleKind::Variable
                | HandleKind::RefCounted
                | HandleKind::Dependent
                | HandleKind::AsyncPinned
                | HandleKind::SizedRef
        )
    }

    /// Handles of this kind pin their object
    #[must_use]
    pub const fn is_pinned(self) -> bool
    {
        matches!(self, HandleKind::Pinned | HandleKind::AsyncPinned)
    }
}

/// A memory location the GC would treat as a live reference
///
/// Roots are facts about one point in time and are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root
{
    /// Location holding the reference (stack slot, static field, handle)
    pub address: Address,
    /// Object the location refers to
    pub object: Address,
    /// Type handle of the referenced object
    pub type_handle: Address,
    /// Where the root was discovered
    pub kind: RootKind,
    /// The reference may point into the middle of an object
    pub is_interior: bool,
    /// The referenced object must not move
    pub is_pinned: bool,
    /// App domain context the root belongs to
    pub app_domain: Address,
    /// OS thread id for stack roots
    pub os_thread_id: Option<u32>,
    /// Handle type for handle roots
    pub handle_kind: Option<HandleKind>,
    /// Secondary object kept alive by a dependent handle
    ///
    /// Only populated when the data-access component reports extended handle data.
    pub dependent_target: Option<Address>,
    /// Best-effort symbol name of the static storage, when requested
    pub name: Option<String>,
}

impl Root
{
    /// Start a root of the given kind with every optional field empty
    pub fn new(kind: RootKind, address: Address, object: Address, type_handle: Address) -> Self
    {
        Self {
            address,
            object,
            type_handle,
            kind,
            is_interior: false,
            is_pinned: false,
            app_domain: Address::ZERO,
            os_thread_id: None,
            handle_kind: None,
            dependent_target: None,
            name: None,
        }
    }
}
