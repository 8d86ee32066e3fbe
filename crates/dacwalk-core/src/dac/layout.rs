//! Fixed binary layouts of response buffers.
//!
//! Every layout is little-endian with natural C alignment; addresses are always
//! 64 bits wide regardless of the target's pointer size. Padding is spelled out
//! with explicit skips so each decoder reads exactly the bytes listed next to it.
//!
//! The `*_SIZE` constants are public so that [`super::DacChannel`] implementations
//! can size and fill responses; the decoders stay private to the crate.

use crate::types::heap::{FINALIZATION_POINTER_COUNT, GENERATION_COUNT};
use crate::types::{
    Address, AppDomain, AppDomainStore, CommonMethodTables, GcInfoRecord, GenerationData, HeapDetails,
    MethodTableRecord, ModuleData, SegmentRecord, ThreadRecord, ThreadStoreSummary,
};

/// Version response: `u32`
pub const VERSION_SIZE: usize = 4;
/// Thread store response
pub const THREAD_STORE_SIZE: usize = 56;
/// Per-thread response
pub const THREAD_SIZE: usize = 104;
/// GC heap data response
pub const GC_HEAP_DATA_SIZE: usize = 16;
/// Heap details response (server and workstation)
pub const HEAP_DETAILS_SIZE: usize = 232;
/// Heap segment response
pub const SEGMENT_SIZE: usize = 80;
/// Method table response
pub const METHOD_TABLE_SIZE: usize = 64;
/// Useful globals response
pub const USEFUL_GLOBALS_SIZE: usize = 40;
/// Module count response: `u32`
pub const MODULE_COUNT_SIZE: usize = 4;
/// Module data response
pub const MODULE_DATA_SIZE: usize = 56;
/// App domain store response
pub const APP_DOMAIN_STORE_SIZE: usize = 24;
/// App domain data response
pub const APP_DOMAIN_SIZE: usize = 72;
/// One element of a pointer list response
pub const POINTER_SIZE: usize = 8;

/// Bounds-checked little-endian cursor over a response buffer
///
/// Every read returns `None` instead of panicking when the buffer is short, so a
/// decoder over a truncated buffer degrades to "no data".
#[derive(Debug)]
pub(crate) struct LayoutReader<'a>
{
    data: &'a [u8],
    offset: usize,
}

impl<'a> LayoutReader<'a>
{
    pub(crate) fn new(data: &'a [u8]) -> Self
    {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]>
    {
        let end = self.offset.checked_add(N)?;
        let bytes = self.data.get(self.offset..end)?;
        self.offset = end;
        bytes.try_into().ok()
    }

    pub(crate) fn skip(&mut self, len: usize) -> Option<()>
    {
        let end = self.offset.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        self.offset = end;
        Some(())
    }

    pub(crate) fn u16(&mut self) -> Option<u16>
    {
        self.take::<2>().map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self) -> Option<u32>
    {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&mut self) -> Option<i32>
    {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> Option<u64>
    {
        self.take::<8>().map(u64::from_le_bytes)
    }

    pub(crate) fn address(&mut self) -> Option<Address>
    {
        self.take::<8>().map(Address::from_le_bytes)
    }

    /// A 32-bit `BOOL`: any non-zero value is true
    pub(crate) fn bool32(&mut self) -> Option<bool>
    {
        self.u32().map(|value| value != 0)
    }
}

/// A record with a fixed response layout
pub(crate) trait Decode: Sized
{
    /// Exact response size in bytes
    const SIZE: usize;

    fn decode(reader: &mut LayoutReader<'_>) -> Option<Self>;

    fn from_bytes(bytes: &[u8]) -> Option<Self>
    {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Self::decode(&mut LayoutReader::new(bytes))
    }
}

impl Decode for ThreadStoreSummary
{
    const SIZE: usize = THREAD_STORE_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let thread_count = r.i32()?;
        let unstarted_count = r.i32()?;
        let background_count = r.i32()?;
        let pending_count = r.i32()?;
        let dead_count = r.i32()?;
        r.skip(4)?;
        let first_thread = r.address()?;
        let finalizer_thread = r.address()?;
        let gc_thread = r.address()?;
        // host config flags + tail padding
        r.skip(8)?;
        Some(Self {
            thread_count,
            unstarted_count,
            background_count,
            pending_count,
            dead_count,
            first_thread,
            finalizer_thread,
            gc_thread,
        })
    }
}

/// Thread record before the finalizer flag and its own address are known
pub(crate) struct ThreadData(pub(crate) ThreadRecord);

impl Decode for ThreadData
{
    const SIZE: usize = THREAD_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let managed_thread_id = r.u32()?;
        let os_thread_id = r.u32()?;
        let state = r.u32()?;
        let preemptive_gc_disabled = r.bool32()?;
        let alloc_context_pointer = r.address()?;
        let alloc_context_limit = r.address()?;
        let _context = r.address()?;
        let app_domain = r.address()?;
        let frame = r.address()?;
        let lock_count = r.u32()?;
        r.skip(4)?;
        let _first_nested_exception = r.address()?;
        let teb = r.address()?;
        let _fiber_data = r.address()?;
        let last_thrown_object_handle = r.address()?;
        let next_thread = r.address()?;
        Some(Self(ThreadRecord {
            address: Address::ZERO,
            managed_thread_id,
            os_thread_id,
            state,
            preemptive_gc_disabled,
            alloc_context_pointer,
            alloc_context_limit,
            app_domain,
            frame,
            lock_count,
            teb,
            last_thrown_object_handle,
            next_thread,
            is_finalizer_thread: false,
        }))
    }
}

impl Decode for GcInfoRecord
{
    const SIZE: usize = GC_HEAP_DATA_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        Some(Self {
            server_mode: r.bool32()?,
            structures_valid: r.bool32()?,
            heap_count: r.u32()?,
            max_generation: r.u32()?,
        })
    }
}

impl Decode for HeapDetails
{
    const SIZE: usize = HEAP_DETAILS_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let heap_address = r.address()?;
        let alloc_allocated = r.address()?;
        let mut generations = [GenerationData::default(); GENERATION_COUNT];
        for generation in &mut generations {
            *generation = GenerationData {
                start_segment: r.address()?,
                allocation_start: r.address()?,
                alloc_context_pointer: r.address()?,
                alloc_context_limit: r.address()?,
            };
        }
        let ephemeral_segment = r.address()?;
        let mut finalization_fill_pointers = [Address::ZERO; FINALIZATION_POINTER_COUNT];
        for pointer in &mut finalization_fill_pointers {
            *pointer = r.address()?;
        }
        Some(Self {
            heap_address,
            alloc_allocated,
            generations,
            ephemeral_segment,
            finalization_fill_pointers,
            lowest_address: r.address()?,
            highest_address: r.address()?,
            card_table: r.address()?,
        })
    }
}

impl Decode for SegmentRecord
{
    const SIZE: usize = SEGMENT_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let record = Self {
            address: r.address()?,
            allocated: r.address()?,
            committed: r.address()?,
            reserved: r.address()?,
            used: r.address()?,
            mem: r.address()?,
            next: r.address()?,
            gc_heap: r.address()?,
            high_alloc_mark: r.address()?,
            is_read_only: r.bool32()?,
        };
        r.skip(4)?;
        Some(record)
    }
}

impl Decode for MethodTableRecord
{
    const SIZE: usize = METHOD_TABLE_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let is_free = r.bool32()?;
        r.skip(4)?;
        Some(Self {
            handle: Address::ZERO,
            is_free,
            module: r.address()?,
            class: r.address()?,
            parent: r.address()?,
            num_interfaces: r.u16()?,
            num_methods: r.u16()?,
            num_vtable_slots: r.u16()?,
            num_virtuals: r.u16()?,
            base_size: r.u32()?,
            component_size: r.u32()?,
            token: r.u32()?,
            attr_class: r.u32()?,
            contains_pointers: r.bool32()?,
            is_shared: r.bool32()?,
        })
    }
}

impl Decode for CommonMethodTables
{
    const SIZE: usize = USEFUL_GLOBALS_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        Some(Self {
            array: r.address()?,
            string: r.address()?,
            object: r.address()?,
            exception: r.address()?,
            free: r.address()?,
        })
    }
}

impl Decode for ModuleData
{
    const SIZE: usize = MODULE_DATA_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        Some(Self {
            address: r.address()?,
            pe_file: r.address()?,
            il_base: r.address()?,
            metadata_start: r.address()?,
            metadata_size: r.u64()?,
            assembly: r.address()?,
            is_reflection: r.bool32()?,
            is_pe_file: r.bool32()?,
        })
    }
}

impl Decode for AppDomainStore
{
    const SIZE: usize = APP_DOMAIN_STORE_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let store = Self {
            shared_domain: r.address()?,
            system_domain: r.address()?,
            domain_count: r.i32()?,
        };
        r.skip(4)?;
        Some(store)
    }
}

impl Decode for AppDomain
{
    const SIZE: usize = APP_DOMAIN_SIZE;

    fn decode(r: &mut LayoutReader<'_>) -> Option<Self>
    {
        let address = r.address()?;
        let security_descriptor = r.address()?;
        let low_frequency_heap = r.address()?;
        let high_frequency_heap = r.address()?;
        let stub_heap = r.address()?;
        let domain_local_block = r.address()?;
        let domain_local_modules = r.address()?;
        Some(Self {
            address,
            id: r.u32()?,
            security_descriptor,
            low_frequency_heap,
            high_frequency_heap,
            stub_heap,
            domain_local_block,
            domain_local_modules,
            assembly_count: r.i32()?,
            failed_assembly_count: r.i32()?,
            stage: r.i32()?,
        })
    }
}

/// Decode a packed array of 64-bit addresses
pub(crate) fn decode_addresses(bytes: &[u8]) -> Vec<Address>
{
    bytes
        .chunks_exact(POINTER_SIZE)
        .filter_map(|chunk| chunk.try_into().ok().map(Address::from_le_bytes))
        .collect()
}
