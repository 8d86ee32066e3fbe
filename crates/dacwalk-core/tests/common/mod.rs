//! Scripted stand-ins for the data target and the data-access component.
//!
//! Both stubs share their state through `Rc`, so a test can keep a handle to the
//! script after the runtime has taken ownership of the boxed stub.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use dacwalk_core::dac::layout;
use dacwalk_core::dac::{DacChannel, DacRequest, RawHandle, RawStackRoot, RawStaticRoot, RequestError, RootTraversal};
use dacwalk_core::error::{DacError, Result};
use dacwalk_core::target::DataTarget;
use dacwalk_core::types::{Address, Architecture, ModuleRecord};

pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

pub fn init()
{
    dacwalk_utils::init_test_logging();
}

// ============================================================================
// Layout writer
// ============================================================================

/// Little-endian response builder
#[derive(Default)]
pub struct LayoutWriter
{
    bytes: Vec<u8>,
}

impl LayoutWriter
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn u16(mut self, value: u16) -> Self
    {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self
    {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(mut self, value: i32) -> Self
    {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self
    {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn pad(mut self, len: usize) -> Self
    {
        self.bytes.resize(self.bytes.len() + len, 0);
        self
    }

    pub fn finish(self) -> Vec<u8>
    {
        self.bytes
    }
}

pub fn thread_store_bytes(count: i32, first: u64, finalizer: u64) -> Vec<u8>
{
    LayoutWriter::new()
        .i32(count)
        .i32(0)
        .i32(0)
        .i32(0)
        .i32(0)
        .pad(4)
        .u64(first)
        .u64(finalizer)
        .u64(0)
        .pad(8)
        .finish()
}

pub fn thread_bytes(os_thread_id: u32, app_domain: u64, next: u64) -> Vec<u8>
{
    LayoutWriter::new()
        .u32(os_thread_id) // managed id
        .u32(os_thread_id)
        .u32(0x20)
        .u32(1)
        .u64(0) // alloc pointer
        .u64(0) // alloc limit
        .u64(0) // context
        .u64(app_domain)
        .u64(0) // frame
        .u32(0)
        .pad(4)
        .u64(0) // nested exception
        .u64(0x7ffd_0000) // teb
        .u64(0) // fiber
        .u64(0) // last thrown
        .u64(next)
        .finish()
}

pub fn gc_info_bytes(server: bool, heap_count: u32, max_generation: u32) -> Vec<u8>
{
    LayoutWriter::new()
        .u32(u32::from(server))
        .u32(1)
        .u32(heap_count)
        .u32(max_generation)
        .finish()
}

/// Heap details with the given gen2 and LOH start segments
pub fn heap_details_bytes(heap: u64, gen2_segment: u64, loh_segment: u64, ephemeral: u64) -> Vec<u8>
{
    let mut writer = LayoutWriter::new().u64(heap).u64(0);
    for start in [ephemeral, ephemeral, gen2_segment, loh_segment] {
        writer = writer.u64(start).u64(0).u64(0).u64(0);
    }
    writer = writer.u64(ephemeral);
    writer.pad(7 * 8).u64(0x1000).u64(0xffff_0000).u64(0).finish()
}

pub fn segment_bytes(address: u64, mem: u64, allocated: u64, next: u64) -> Vec<u8>
{
    LayoutWriter::new()
        .u64(address)
        .u64(allocated)
        .u64(allocated) // committed
        .u64(allocated + 0x1000) // reserved
        .u64(allocated) // used
        .u64(mem)
        .u64(next)
        .u64(0) // gc heap
        .u64(allocated)
        .u32(0)
        .pad(4)
        .finish()
}

pub fn method_table_bytes(base_size: u32, component_size: u32) -> Vec<u8>
{
    LayoutWriter::new()
        .u32(0)
        .pad(4)
        .u64(0xa000) // module
        .u64(0xb000) // class
        .u64(0xc000) // parent
        .u16(2)
        .u16(12)
        .u16(16)
        .u16(4)
        .u32(base_size)
        .u32(component_size)
        .u32(0x0200_0002)
        .u32(0x0010_0001)
        .u32(1)
        .u32(0)
        .finish()
}

pub fn useful_globals_bytes(free: u64) -> Vec<u8>
{
    LayoutWriter::new()
        .u64(0x1100)
        .u64(0x1200)
        .u64(0x1300)
        .u64(0x1400)
        .u64(free)
        .finish()
}

pub fn module_data_bytes(address: u64, metadata_start: u64, metadata_size: u64) -> Vec<u8>
{
    LayoutWriter::new()
        .u64(address)
        .u64(address + 0x10) // pe file
        .u64(address + 0x20) // il base
        .u64(metadata_start)
        .u64(metadata_size)
        .u64(address + 0x30) // assembly
        .u32(0)
        .u32(1)
        .finish()
}

pub fn domain_store_bytes(shared: u64, system: u64, count: i32) -> Vec<u8>
{
    LayoutWriter::new().u64(shared).u64(system).i32(count).pad(4).finish()
}

pub fn app_domain_bytes(address: u64, id: u32) -> Vec<u8>
{
    LayoutWriter::new().u64(address).pad(6 * 8).u32(id).i32(3).i32(0).i32(4).finish()
}

pub fn pointers(values: &[u64]) -> Vec<u8>
{
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

// ============================================================================
// Fake data-access component
// ============================================================================

/// Shared script behind a [`FakeDac`]
#[derive(Default)]
pub struct DacScript
{
    pub version: Cell<Option<u32>>,
    responses: RefCell<HashMap<(u32, Vec<u8>), Vec<u8>>>,
    pub requests: RefCell<Vec<u32>>,
    pub expose_traversal: Cell<bool>,
    pub stack_roots: RefCell<HashMap<Address, Vec<RawStackRoot>>>,
    pub static_roots: RefCell<Vec<RawStaticRoot>>,
    pub handles: RefCell<Vec<RawHandle>>,
    /// `(thread, context length)` per stack traversal
    pub stack_walks: RefCell<Vec<(Address, usize)>>,
    pub static_walks: RefCell<Vec<bool>>,
    pub handle_walks: RefCell<Vec<bool>>,
}

impl DacScript
{
    /// Script answering the version request with `version` and exposing traversal
    pub fn new(version: u32) -> Rc<Self>
    {
        let script = Self::default();
        script.version.set(Some(version));
        script.expose_traversal.set(true);
        Rc::new(script)
    }

    pub fn channel(self: &Rc<Self>) -> Box<dyn DacChannel>
    {
        Box::new(FakeDac(Rc::clone(self)))
    }

    /// Answer `request` with `output` when the input is exactly `input`
    pub fn respond(&self, request: DacRequest, input: &[u8], output: Vec<u8>)
    {
        self.responses.borrow_mut().insert((request.id(), input.to_vec()), output);
    }

    /// Answer an inputless request
    pub fn respond_global(&self, request: DacRequest, output: Vec<u8>)
    {
        self.respond(request, &[], output);
    }

    /// Answer a request keyed by one address
    pub fn respond_at(&self, request: DacRequest, address: u64, output: Vec<u8>)
    {
        self.respond(request, &address.to_le_bytes(), output);
    }

    pub fn forget(&self, request: DacRequest)
    {
        self.responses.borrow_mut().retain(|(id, _), _| *id != request.id());
    }

    pub fn thread_chain(&self, chain: &[(u64, u32)], finalizer: u64)
    {
        let first = chain.first().map_or(0, |(address, _)| *address);
        self.respond_global(
            DacRequest::ThreadStore,
            thread_store_bytes(i32::try_from(chain.len()).unwrap(), first, finalizer),
        );
        for (index, (address, os_id)) in chain.iter().enumerate() {
            let next = chain.get(index + 1).map_or(0, |(next, _)| *next);
            self.respond_at(DacRequest::Thread, *address, thread_bytes(*os_id, 0xd000, next));
        }
    }

    pub fn module_list(&self, values: &[u64])
    {
        let count = u32::try_from(values.len()).unwrap();
        self.respond_global(DacRequest::ModuleCount, count.to_le_bytes().to_vec());
        self.respond(DacRequest::ModuleList, &count.to_le_bytes(), pointers(values));
    }

    pub fn count(&self, request: DacRequest) -> usize
    {
        self.requests.borrow().iter().filter(|&&id| id == request.id()).count()
    }

    pub fn traversal_calls(&self) -> usize
    {
        self.stack_walks.borrow().len() + self.static_walks.borrow().len() + self.handle_walks.borrow().len()
    }
}

pub struct FakeDac(pub Rc<DacScript>);

impl DacChannel for FakeDac
{
    fn request(&self, request: u32, input: Option<&[u8]>, output: &mut [u8]) -> std::result::Result<(), RequestError>
    {
        let script = &self.0;
        script.requests.borrow_mut().push(request);
        let failed = RequestError {
            request,
            status: E_FAIL,
        };

        if request == DacRequest::Version.id() {
            let version = script.version.get().ok_or(failed)?;
            output[..layout::VERSION_SIZE].copy_from_slice(&version.to_le_bytes());
            return Ok(());
        }

        let key = (request, input.unwrap_or_default().to_vec());
        let responses = script.responses.borrow();
        let response = responses.get(&key).ok_or(failed)?;
        if response.len() != output.len() {
            return Err(failed);
        }
        output.copy_from_slice(response);
        Ok(())
    }

    fn root_traversal(&self) -> Option<&dyn RootTraversal>
    {
        if self.0.expose_traversal.get() {
            Some(self)
        } else {
            None
        }
    }
}

impl RootTraversal for FakeDac
{
    fn traverse_stack_roots(
        &self,
        thread: Address,
        context: &mut [u8],
        sink: &mut dyn FnMut(RawStackRoot),
    ) -> std::result::Result<(), RequestError>
    {
        self.0.stack_walks.borrow_mut().push((thread, context.len()));
        for root in self.0.stack_roots.borrow().get(&thread).into_iter().flatten() {
            sink(*root);
        }
        Ok(())
    }

    fn traverse_static_roots(
        &self,
        resolve_names: bool,
        sink: &mut dyn FnMut(RawStaticRoot),
    ) -> std::result::Result<(), RequestError>
    {
        self.0.static_walks.borrow_mut().push(resolve_names);
        for root in self.0.static_roots.borrow().iter() {
            let mut root = root.clone();
            if !resolve_names {
                root.name = None;
            }
            sink(root);
        }
        Ok(())
    }

    fn traverse_handle_table(
        &self,
        extended: bool,
        sink: &mut dyn FnMut(RawHandle),
    ) -> std::result::Result<(), RequestError>
    {
        self.0.handle_walks.borrow_mut().push(extended);
        for handle in self.0.handles.borrow().iter() {
            let mut handle = *handle;
            if !extended {
                handle.secondary = Address::ZERO;
            }
            sink(handle);
        }
        Ok(())
    }
}

// ============================================================================
// Fake data target
// ============================================================================

/// Context requests seen by a [`FakeTarget`]: `(os thread id, flags, size)`
pub type ContextLog = Rc<RefCell<Vec<(u32, u32, usize)>>>;

pub struct FakeTarget
{
    pub architecture: Architecture,
    pub modules: Vec<ModuleRecord>,
    /// Readable `[start, end)` ranges
    pub readable: Vec<(u64, u64)>,
    /// OS thread ids that have register state
    pub live_threads: Vec<u32>,
    pub symbols: HashMap<u64, String>,
    pub contexts: ContextLog,
}

impl FakeTarget
{
    pub fn new(architecture: Architecture) -> Self
    {
        Self {
            architecture,
            modules: Vec::new(),
            readable: Vec::new(),
            live_threads: Vec::new(),
            symbols: HashMap::new(),
            contexts: Rc::default(),
        }
    }

    pub fn x64() -> Self
    {
        Self::new(Architecture::X64)
    }
}

impl DataTarget for FakeTarget
{
    fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    fn read_memory(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let start = address.value();
        let end = start + len as u64;
        if self.readable.iter().any(|&(lo, hi)| start >= lo && end <= hi) {
            Ok(vec![0; len])
        } else {
            Err(DacError::ReadFailed { address, len })
        }
    }

    fn enumerate_modules(&self) -> Vec<ModuleRecord>
    {
        self.modules.clone()
    }

    fn thread_context(&self, os_thread_id: u32, flags: u32, size: usize) -> Result<Vec<u8>>
    {
        self.contexts.borrow_mut().push((os_thread_id, flags, size));
        if self.live_threads.contains(&os_thread_id) {
            Ok(vec![0xcc; size])
        } else {
            Err(DacError::ReadFailed {
                address: Address::ZERO,
                len: size,
            })
        }
    }

    fn resolve_symbol(&self, address: Address) -> Option<String>
    {
        self.symbols.get(&address.value()).cloned()
    }
}
