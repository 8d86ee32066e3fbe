//! GC heap, segment and type descriptor records.
//!
//! Every record here is a read-only snapshot of one response buffer. Asking again
//! produces a fresh, independent snapshot; nothing is a live view of the target.

use super::Address;

/// Number of generation table entries in a heap details record (gen0..gen2 + LOH)
pub const GENERATION_COUNT: usize = 4;

/// Number of finalization queue fill pointers in a heap details record
pub const FINALIZATION_POINTER_COUNT: usize = 7;

/// Aggregate GC configuration, decoded from the GC heap data request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcInfoRecord
{
    /// Server GC (one heap per logical CPU) rather than workstation GC
    pub server_mode: bool,
    /// The runtime's GC structures are in a consistent state
    ///
    /// When `false` the target was captured mid-GC and segment data may be torn.
    pub structures_valid: bool,
    /// Number of heaps (always 1 for workstation GC)
    pub heap_count: u32,
    /// Highest small-object generation number (usually 2)
    pub max_generation: u32,
}

/// One generation table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationData
{
    /// First segment of the generation
    pub start_segment: Address,
    /// Address where the generation starts within its segment
    pub allocation_start: Address,
    /// Allocation context pointer
    pub alloc_context_pointer: Address,
    /// Allocation context limit
    pub alloc_context_limit: Address,
}

/// Per-heap details
///
/// For workstation GC there is exactly one, returned by the static details request.
/// For server GC there is one per heap address in the heap list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapDetails
{
    /// Heap object address (zero for the workstation heap)
    pub heap_address: Address,
    /// End of the allocated part of the ephemeral segment
    pub alloc_allocated: Address,
    /// Generation table: gen0, gen1, gen2 and the large object heap
    pub generations: [GenerationData; GENERATION_COUNT],
    /// Segment holding gen0 and gen1
    pub ephemeral_segment: Address,
    /// Finalization queue fill pointers
    pub finalization_fill_pointers: [Address; FINALIZATION_POINTER_COUNT],
    /// Lowest address the GC manages
    pub lowest_address: Address,
    /// Highest address the GC manages
    pub highest_address: Address,
    /// Card table base
    pub card_table: Address,
}

impl HeapDetails
{
    /// Generation table entry, if the index is in range
    pub fn generation(&self, index: usize) -> Option<&GenerationData>
    {
        self.generations.get(index)
    }
}

/// One GC heap segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord
{
    /// Segment address
    pub address: Address,
    /// End of allocated objects
    pub allocated: Address,
    /// End of committed memory
    pub committed: Address,
    /// End of reserved memory
    pub reserved: Address,
    /// High-water mark of memory used
    pub used: Address,
    /// Start of object memory
    pub mem: Address,
    /// Next segment in the chain (zero terminates)
    pub next: Address,
    /// Owning heap (zero for workstation GC)
    pub gc_heap: Address,
    /// Highest allocation mark
    pub high_alloc_mark: Address,
    /// Segment is a frozen, read-only segment
    pub is_read_only: bool,
}

impl SegmentRecord
{
    /// Bytes of object memory in `[mem, allocated)`
    pub fn allocated_size(&self) -> u64
    {
        self.allocated.value().saturating_sub(self.mem.value())
    }

    /// Check whether an address lies in the allocated object range
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.mem && address < self.allocated
    }
}

/// A heap segment together with the heap and generation chain it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSegment
{
    /// Decoded segment data
    pub record: SegmentRecord,
    /// Index of the owning heap in [`GcHeapSummary::heaps`]
    pub heap_index: usize,
    /// Segment belongs to the large object heap chain
    pub is_large: bool,
    /// Segment is the heap's ephemeral segment
    pub is_ephemeral: bool,
}

/// GC configuration plus the details of every heap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcHeapSummary
{
    /// Aggregate GC information
    pub info: GcInfoRecord,
    /// One entry per heap whose details could be read
    pub heaps: Vec<HeapDetails>,
}

/// Type descriptor, decoded from a method table request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodTableRecord
{
    /// Type handle this record describes
    pub handle: Address,
    /// This is the free-object type
    pub is_free: bool,
    /// Owning module
    pub module: Address,
    /// Class descriptor
    pub class: Address,
    /// Parent type handle
    pub parent: Address,
    /// Number of implemented interfaces
    pub num_interfaces: u16,
    /// Number of methods
    pub num_methods: u16,
    /// Number of vtable slots
    pub num_vtable_slots: u16,
    /// Number of virtual methods
    pub num_virtuals: u16,
    /// Base instance size in bytes
    pub base_size: u32,
    /// Per-element size for arrays and strings, zero otherwise
    pub component_size: u32,
    /// Metadata type definition token
    pub token: u32,
    /// Type attribute flags
    pub attr_class: u32,
    /// Instances contain GC references
    pub contains_pointers: bool,
    /// Type is shared across app domains
    pub is_shared: bool,
}

/// Handles of the runtime's well-known types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonMethodTables
{
    /// `System.Array`
    pub array: Address,
    /// `System.String`
    pub string: Address,
    /// `System.Object`
    pub object: Address,
    /// `System.Exception`
    pub exception: Address,
    /// The free-object filler type
    pub free: Address,
}
