//! Typed accessors over the request channel.
//!
//! Each accessor issues exactly one request and decodes one fixed layout. A failed
//! request is `None`: the absence of one record is a normal outcome when reading a
//! target that may be inconsistent.

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::layout::{self, decode_addresses, Decode, ThreadData};
use super::{DacLibrary, DacRequest};
use crate::types::{
    Address, AppDomain, AppDomainStore, CommonMethodTables, GcInfoRecord, HeapDetails, MethodTableRecord, ModuleData,
    SegmentRecord, ThreadRecord, ThreadStoreSummary,
};

/// Returned by [`DacLibrary::free_type_handle`] when the request fails
///
/// Zero is a valid "no value" answer from the runtime, so failure needs a value of
/// its own. No real type handle lives this close to the top of the address space.
pub const INVALID_TYPE_HANDLE: Address = Address::new(u64::MAX - 42);

/// Largest pointer list the engine will request
///
/// Counts come from target memory; a torn count must not turn into a huge allocation.
pub const MAX_POINTER_LIST: u32 = 1 << 20;

/// Runtime module pointers, usually a few dozen
pub type ModulePointers = SmallVec<[Address; 32]>;

impl DacLibrary
{
    fn request_record<T: Decode>(&self, request: DacRequest, input: Option<&[u8]>) -> Option<T>
    {
        let bytes = self.raw_request(request, input, T::SIZE)?;
        let decoded = T::from_bytes(&bytes);
        if decoded.is_none() {
            warn!(%request, "response did not decode");
        }
        decoded
    }

    /// `count` sizes the response; `send_count` also passes it as the request input
    fn request_pointer_list(&self, request: DacRequest, count: u32, send_count: bool) -> Option<Vec<Address>>
    {
        if count > MAX_POINTER_LIST {
            warn!(%request, count, "pointer list count is implausible, ignoring");
            return None;
        }
        let size = usize::try_from(count).ok()?.checked_mul(layout::POINTER_SIZE)?;
        let input = count.to_le_bytes();
        let bytes = self.raw_request(request, send_count.then_some(input.as_slice()), size)?;
        Some(decode_addresses(&bytes))
    }

    /// Head of the runtime thread list
    pub fn thread_store(&self) -> Option<ThreadStoreSummary>
    {
        self.request_record(DacRequest::ThreadStore, None)
    }

    /// One runtime thread by its thread object address
    ///
    /// The finalizer flag is left unset; only the thread store knows which thread
    /// is the finalizer.
    pub fn thread(&self, address: Address) -> Option<ThreadRecord>
    {
        let ThreadData(mut record) = self.request_record(DacRequest::Thread, Some(&address.to_le_bytes()))?;
        record.address = address;
        Some(record)
    }

    /// Aggregate GC configuration
    pub fn gc_info(&self) -> Option<GcInfoRecord>
    {
        self.request_record(DacRequest::GcHeapData, None)
    }

    /// Server GC heap addresses
    pub fn heap_list(&self, heap_count: u32) -> Option<Vec<Address>>
    {
        self.request_pointer_list(DacRequest::GcHeapList, heap_count, false)
    }

    /// Heap details
    ///
    /// `None` asks for the single workstation heap; `Some(heap)` for one server heap.
    pub fn heap_details(&self, heap: Option<Address>) -> Option<HeapDetails>
    {
        match heap {
            Some(address) => self.request_record(DacRequest::GcHeapDetails, Some(&address.to_le_bytes())),
            None => self.request_record(DacRequest::GcHeapStaticDetails, None),
        }
    }

    /// One heap segment
    pub fn segment(&self, address: Address) -> Option<SegmentRecord>
    {
        self.request_record(DacRequest::HeapSegment, Some(&address.to_le_bytes()))
    }

    /// Type descriptor for a type handle
    pub fn method_table(&self, handle: Address) -> Option<MethodTableRecord>
    {
        let mut record: MethodTableRecord =
            self.request_record(DacRequest::MethodTable, Some(&handle.to_le_bytes()))?;
        record.handle = handle;
        Some(record)
    }

    /// Handles of the runtime's well-known types
    pub fn common_method_tables(&self) -> Option<CommonMethodTables>
    {
        self.request_record(DacRequest::UsefulGlobals, None)
    }

    /// Type handle of the free-object filler type
    ///
    /// Returns [`INVALID_TYPE_HANDLE`] when the request fails, never zero.
    ///
    /// ```rust,no_run
    /// use dacwalk_core::dac::accessors::INVALID_TYPE_HANDLE;
    /// # fn demo(dac: &dacwalk_core::dac::DacLibrary) {
    /// let free = dac.free_type_handle();
    /// if free == INVALID_TYPE_HANDLE {
    ///     println!("free type unavailable");
    /// }
    /// # }
    /// ```
    pub fn free_type_handle(&self) -> Address
    {
        self.common_method_tables()
            .map_or(INVALID_TYPE_HANDLE, |tables| tables.free)
    }

    /// The runtime's module pointers, in the order the runtime reports them
    ///
    /// Issues the count request, then the list request sized to that count. `None`
    /// when either request fails. A zero count is a valid answer and yields an empty
    /// list without a second request.
    pub fn module_pointers(&self) -> Option<ModulePointers>
    {
        let bytes = self.raw_request(DacRequest::ModuleCount, None, layout::MODULE_COUNT_SIZE)?;
        let count = u32::from_le_bytes(bytes.as_slice().try_into().ok()?);
        if count == 0 {
            trace!("runtime reports no modules");
            return Some(ModulePointers::new());
        }
        let pointers = self.request_pointer_list(DacRequest::ModuleList, count, true)?;
        Some(pointers.into_iter().collect())
    }

    /// Runtime data for one module pointer
    pub fn module_data(&self, pointer: Address) -> Option<ModuleData>
    {
        self.request_record(DacRequest::ModuleData, Some(&pointer.to_le_bytes()))
    }

    /// App domain store summary
    pub fn app_domain_store(&self) -> Option<AppDomainStore>
    {
        self.request_record(DacRequest::AppDomainStore, None)
    }

    /// User app domain addresses
    pub fn app_domain_list(&self, count: u32) -> Option<Vec<Address>>
    {
        self.request_pointer_list(DacRequest::AppDomainList, count, true)
    }

    /// One app domain
    pub fn app_domain(&self, address: Address) -> Option<AppDomain>
    {
        self.request_record(DacRequest::AppDomainData, Some(&address.to_le_bytes()))
    }
}
