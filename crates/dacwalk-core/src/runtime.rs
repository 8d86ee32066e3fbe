//! # Runtime Facade
//!
//! [`ClrRuntime`] is the single entry point for inspecting one managed runtime
//! instance.
//!
//! ## Caching
//!
//! The module table, thread list, app-domain data and heap summary are computed on
//! first use and kept for the session. The target is assumed frozen, so they never
//! go stale on their own; [`ClrRuntime::flush`] drops them all when the caller knows
//! the target has moved on (for example after resuming and re-suspending a live
//! process).
//!
//! Everything else (segments, method tables, roots) is fetched fresh on every call.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dacwalk_core::ClrRuntime;
//! # fn demo(target: Box<dyn dacwalk_core::target::DataTarget>, dac: Box<dyn dacwalk_core::dac::DacChannel>)
//! # -> dacwalk_core::Result<()> {
//! let runtime = ClrRuntime::new(target, dac)?;
//! for thread in runtime.threads()? {
//!     let roots = runtime.enumerate_stack_roots(thread)?;
//!     println!("thread {} has {} stack roots", thread.os_thread_id, roots.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::config::RuntimeOptions;
use crate::dac::{DacChannel, DacLibrary};
use crate::error::{DacError, Result};
use crate::roots::{self, handles, stack, statics};
use crate::target::DataTarget;
use crate::types::{
    Address, AppDomain, AppDomainStore, Architecture, CommonMethodTables, GcHeapSummary, HeapDetails, HeapSegment,
    MethodTableRecord, ModuleData, Root, RuntimeModule, SegmentRecord, ThreadRecord,
};
use crate::{modules, threads};

/// One inspected runtime instance
///
/// Single-threaded: the lazy caches use `unsync` cells, so the facade is neither
/// `Send` nor `Sync`. Create one per target per thread.
pub struct ClrRuntime
{
    target: Box<dyn DataTarget>,
    dac: DacLibrary,
    options: RuntimeOptions,
    modules: OnceCell<Vec<RuntimeModule>>,
    threads: OnceCell<Vec<ThreadRecord>>,
    domain_store: OnceCell<Option<AppDomainStore>>,
    app_domain: OnceCell<Option<AppDomain>>,
    heap: OnceCell<Option<GcHeapSummary>>,
}

impl std::fmt::Debug for ClrRuntime
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("ClrRuntime")
            .field("architecture", &self.target.architecture())
            .field("dac", &self.dac)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ClrRuntime
{
    /// Negotiate with the data-access component and open a session with default options
    ///
    /// ## Errors
    ///
    /// - `VersionRequestFailed`: The version request failed
    /// - `UnsupportedDacVersion`: The component speaks a version other than 10 or 11
    pub fn new(target: Box<dyn DataTarget>, channel: Box<dyn DacChannel>) -> Result<Self>
    {
        Self::with_options(target, channel, RuntimeOptions::default())
    }

    /// Same as [`ClrRuntime::new`] with explicit options
    ///
    /// ## Errors
    ///
    /// See [`ClrRuntime::new`].
    pub fn with_options(target: Box<dyn DataTarget>, channel: Box<dyn DacChannel>, options: RuntimeOptions) -> Result<Self>
    {
        let dac = DacLibrary::new(channel)?;
        Ok(Self::from_library(target, dac, options))
    }

    /// Open a session over an already negotiated library
    pub fn from_library(target: Box<dyn DataTarget>, dac: DacLibrary, options: RuntimeOptions) -> Self
    {
        debug!(
            architecture = %target.architecture(),
            version = dac.version(),
            ?options,
            "opened runtime session"
        );
        Self {
            target,
            dac,
            options,
            modules: OnceCell::new(),
            threads: OnceCell::new(),
            domain_store: OnceCell::new(),
            app_domain: OnceCell::new(),
            heap: OnceCell::new(),
        }
    }

    /// The data target this session reads from
    pub fn target(&self) -> &dyn DataTarget
    {
        self.target.as_ref()
    }

    /// The negotiated data-access library
    pub fn dac(&self) -> &DacLibrary
    {
        &self.dac
    }

    /// Session options
    pub fn options(&self) -> &RuntimeOptions
    {
        &self.options
    }

    /// Target architecture
    pub fn architecture(&self) -> Architecture
    {
        self.target.architecture()
    }

    // ========================================================================
    // Cached views
    // ========================================================================

    /// Runtime threads, in list order
    ///
    /// A failed walk is not cached; the next call walks again.
    ///
    /// ## Errors
    ///
    /// - `ThreadWalkTruncated`: A link could not be read and strict walking is enabled
    pub fn threads(&self) -> Result<&[ThreadRecord]>
    {
        self.threads
            .get_or_try_init(|| threads::walk_threads(&self.dac, &self.options))
            .map(Vec::as_slice)
    }

    /// Modules confirmed by the runtime, sorted by image base
    pub fn modules(&self) -> &[RuntimeModule]
    {
        self.modules
            .get_or_init(|| modules::correlate(self.target.as_ref(), &self.dac))
    }

    /// Runtime metadata for a module, resolved on first request
    ///
    /// `None` for modules without a runtime pointer (degraded correlation) or when
    /// the module data request fails.
    pub fn module_metadata(&self, module: &RuntimeModule) -> Option<ModuleData>
    {
        *module
            .metadata
            .get_or_init(|| module.runtime_pointer().and_then(|pointer| self.dac.module_data(pointer)))
    }

    fn domain_store(&self) -> Option<AppDomainStore>
    {
        *self.domain_store.get_or_init(|| self.dac.app_domain_store())
    }

    /// The first user app domain
    pub fn app_domain(&self) -> Option<AppDomain>
    {
        *self.app_domain.get_or_init(|| {
            let store = self.domain_store()?;
            let count = u32::try_from(store.domain_count).ok().filter(|&count| count > 0)?;
            let first = *self.dac.app_domain_list(count)?.first()?;
            self.dac.app_domain(first)
        })
    }

    /// Address of the system domain
    pub fn system_domain(&self) -> Option<Address>
    {
        self.domain_store()
            .map(|store| store.system_domain)
            .filter(|address| !address.is_null())
    }

    /// Address of the shared domain
    pub fn shared_domain(&self) -> Option<Address>
    {
        self.domain_store()
            .map(|store| store.shared_domain)
            .filter(|address| !address.is_null())
    }

    /// GC configuration and the details of every readable heap
    pub fn heap(&self) -> Option<&GcHeapSummary>
    {
        self.heap.get_or_init(|| self.read_heap()).as_ref()
    }

    fn read_heap(&self) -> Option<GcHeapSummary>
    {
        let info = self.dac.gc_info()?;
        if !info.structures_valid {
            warn!("GC structures are not in a valid state, heap data may be inconsistent");
        }

        let heaps = if info.server_mode {
            let addresses = self.dac.heap_list(info.heap_count)?;
            addresses
                .into_iter()
                .filter_map(|address| {
                    let details = self.dac.heap_details(Some(address));
                    if details.is_none() {
                        warn!(heap = %address, "heap details unavailable");
                    }
                    details
                })
                .collect()
        } else {
            vec![self.dac.heap_details(None)?]
        };

        debug!(server = info.server_mode, heaps = heaps.len(), "read GC heap summary");
        Some(GcHeapSummary { info, heaps })
    }

    // ========================================================================
    // Uncached lookups
    // ========================================================================

    /// Details of one server heap, or of the workstation heap for `None`
    pub fn heap_details(&self, heap: Option<Address>) -> Option<HeapDetails>
    {
        self.dac.heap_details(heap)
    }

    /// One heap segment
    pub fn segment(&self, address: Address) -> Option<SegmentRecord>
    {
        self.dac.segment(address)
    }

    /// Every segment reachable from the heaps' small and large object chains
    ///
    /// Chains stop at a zero link, an unreadable segment or a segment already seen.
    pub fn segments(&self) -> Vec<HeapSegment>
    {
        let Some(heap) = self.heap() else {
            return Vec::new();
        };
        let max_generation = usize::try_from(heap.info.max_generation).unwrap_or(usize::MAX);

        let mut segments = Vec::new();
        let mut visited = HashSet::new();
        for (heap_index, details) in heap.heaps.iter().enumerate() {
            for (generation, is_large) in [(max_generation, false), (max_generation.saturating_add(1), true)] {
                let Some(start) = details.generation(generation).map(|entry| entry.start_segment) else {
                    continue;
                };
                let mut next = start;
                while !next.is_null() && visited.insert(next) {
                    let Some(record) = self.dac.segment(next) else {
                        warn!(segment = %next, "segment unreadable, chain truncated");
                        break;
                    };
                    segments.push(HeapSegment {
                        record,
                        heap_index,
                        is_large,
                        is_ephemeral: next == details.ephemeral_segment,
                    });
                    next = record.next;
                }
            }
        }
        debug!(count = segments.len(), "walked heap segments");
        segments
    }

    /// Type descriptor for a type handle
    pub fn method_table(&self, handle: Address) -> Option<MethodTableRecord>
    {
        self.dac.method_table(handle)
    }

    /// Type handle of the free-object filler type
    ///
    /// Never zero: a failed request returns
    /// [`crate::dac::accessors::INVALID_TYPE_HANDLE`].
    pub fn free_type_handle(&self) -> Address
    {
        self.dac.free_type_handle()
    }

    /// Handles of the runtime's well-known types
    pub fn common_method_tables(&self) -> Option<CommonMethodTables>
    {
        self.dac.common_method_tables()
    }

    // ========================================================================
    // Roots
    // ========================================================================

    /// Roots in one thread's managed frames
    ///
    /// ## Errors
    ///
    /// - `UnsupportedArchitecture`: No register context layout for the target
    /// - `MissingInterface`: The data-access component does not expose root traversal
    pub fn enumerate_stack_roots(&self, thread: &ThreadRecord) -> Result<Vec<Root>>
    {
        let roots = stack::enumerate(self.target.as_ref(), &self.dac, thread)?;
        Ok(self.verified(roots))
    }

    /// Stack roots of every thread in the thread list
    ///
    /// ## Errors
    ///
    /// See [`ClrRuntime::threads`] and [`ClrRuntime::enumerate_stack_roots`].
    pub fn enumerate_all_stack_roots(&self) -> Result<Vec<Root>>
    {
        let mut roots = Vec::new();
        for thread in self.threads()? {
            roots.extend(self.enumerate_stack_roots(thread)?);
        }
        Ok(roots)
    }

    /// Static field roots, optionally with best-effort names
    ///
    /// ## Errors
    ///
    /// - `MissingInterface`: The data-access component does not expose root traversal
    pub fn enumerate_static_roots(&self, resolve_names: bool) -> Result<Vec<Root>>
    {
        let roots = statics::enumerate(self.target.as_ref(), &self.dac, resolve_names)?;
        Ok(self.verified(roots))
    }

    /// Strong handle table roots
    ///
    /// ## Errors
    ///
    /// - `MissingInterface`: The data-access component does not expose root traversal
    pub fn enumerate_handle_roots(&self) -> Result<Vec<Root>>
    {
        let roots = handles::enumerate(&self.dac)?;
        Ok(self.verified(roots))
    }

    fn verified(&self, mut roots: Vec<Root>) -> Vec<Root>
    {
        if self.options.verify_root_addresses {
            roots::retain_readable(self.target.as_ref(), &mut roots);
        }
        roots
    }

    // ========================================================================
    // Unsupported surface
    // ========================================================================

    /// Every handle table entry, including weak ones
    ///
    /// ## Errors
    ///
    /// Always `Unsupported`; use [`ClrRuntime::enumerate_handle_roots`].
    pub fn enumerate_handles(&self) -> Result<Vec<Root>>
    {
        unsupported("enumerate_handles")
    }

    /// Memory regions owned by the runtime, as `(start, size)`
    ///
    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn enumerate_memory_regions(&self) -> Result<Vec<(Address, u64)>>
    {
        unsupported("enumerate_memory_regions")
    }

    /// The method whose code contains `ip`
    ///
    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn method_by_ip(&self, _ip: Address) -> Result<Address>
    {
        unsupported("method_by_ip")
    }

    /// Dedicated GC threads
    ///
    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn gc_threads(&self) -> Result<Vec<ThreadRecord>>
    {
        unsupported("gc_threads")
    }

    /// COM callable wrapper data for an object
    ///
    /// ## Errors
    ///
    /// Always `Unsupported`.
    pub fn ccw_data(&self, _object: Address) -> Result<Address>
    {
        unsupported("ccw_data")
    }

    // ========================================================================
    // Cache control
    // ========================================================================

    /// Drop every cached view so the next access recomputes it
    pub fn flush(&mut self)
    {
        self.modules.take();
        self.threads.take();
        self.domain_store.take();
        self.app_domain.take();
        self.heap.take();
        debug!("flushed runtime caches");
    }
}

fn unsupported<T>(operation: &'static str) -> Result<T>
{
    Err(DacError::Unsupported { operation })
}
