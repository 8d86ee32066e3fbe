//! Tests for the runtime facade: modules, threads, heap, caching

mod common;

use common::{
    app_domain_bytes, domain_store_bytes, gc_info_bytes, heap_details_bytes, init, module_data_bytes, pointers,
    segment_bytes, DacScript, FakeTarget,
};
use dacwalk_core::dac::DacRequest;
use dacwalk_core::error::DacError;
use dacwalk_core::modules::correlate_records;
use dacwalk_core::types::{Address, ModuleRecord};
use dacwalk_core::{ClrRuntime, RuntimeOptions};

fn runtime_with(target: FakeTarget, script: &std::rc::Rc<DacScript>) -> ClrRuntime
{
    init();
    ClrRuntime::new(Box::new(target), script.channel()).unwrap()
}

fn addresses(values: &[u64]) -> Vec<Address>
{
    values.iter().copied().map(Address::new).collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_construction_requires_supported_version()
{
    let err = ClrRuntime::new(Box::new(FakeTarget::x64()), DacScript::new(9).channel()).unwrap_err();
    assert_eq!(err, DacError::UnsupportedDacVersion(9));
    assert!(ClrRuntime::new(Box::new(FakeTarget::x64()), DacScript::new(10).channel()).is_ok());
}

// ============================================================================
// Modules
// ============================================================================

#[test]
fn test_modules_keep_only_runtime_confirmed_images()
{
    let script = DacScript::new(11);
    script.module_list(&[500, 120]);
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(200, 50, "b.dll"), ModuleRecord::new(100, 50, "a.dll")];

    let runtime = runtime_with(target, &script);
    let modules = runtime.modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].image_base(), Address::new(100));
    assert_eq!(modules[0].file_size(), 50);
    assert_eq!(modules[0].record().file_name(), Some("a.dll"));
}

#[test]
fn test_module_table_is_cached()
{
    let script = DacScript::new(11);
    script.module_list(&[120]);
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(100, 50, "a.dll")];

    let runtime = runtime_with(target, &script);
    assert_eq!(runtime.modules().len(), 1);
    assert_eq!(runtime.modules().len(), 1);
    assert_eq!(script.count(DacRequest::ModuleCount), 1);
}

#[test]
fn test_module_correlation_degrades_to_os_list()
{
    let script = DacScript::new(11);
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(0x3000, 0x100, "c.dll"), ModuleRecord::new(0x1000, 0x100, "a.dll")];

    let runtime = runtime_with(target, &script);
    let bases: Vec<_> = runtime.modules().iter().map(|m| m.image_base().value()).collect();
    assert_eq!(bases, vec![0x1000, 0x3000]);
    assert!(runtime.modules().iter().all(|m| m.runtime_pointer().is_none()));
    assert!(runtime.module_metadata(&runtime.modules()[0]).is_none());
}

#[test]
fn test_zero_runtime_modules_empty_the_table()
{
    let script = DacScript::new(11);
    script.module_list(&[]);
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(100, 50, "a.dll"), ModuleRecord::new(200, 50, "b.dll")];

    let runtime = runtime_with(target, &script);
    assert!(runtime.modules().is_empty());
    assert_eq!(script.count(DacRequest::ModuleList), 0);
}

#[test]
fn test_module_correlation_properties()
{
    let os = vec![
        ModuleRecord::new(0x5000, 0x800, "e.dll"),
        ModuleRecord::new(0x1000, 0x1000, "a.dll"),
        ModuleRecord::new(0x3000, 0x200, "c.dll"),
        ModuleRecord::new(0x2000, 0x100, "b.dll"),
    ];
    let runtime_pointers = [0x5100, 0x0500, 0x1800, 0x3100, 0x3150, 0x9000];

    let first = correlate_records(os.clone(), &mut addresses(&runtime_pointers));
    let again = correlate_records(os.clone(), &mut addresses(&runtime_pointers));
    assert_eq!(first, again);

    for pair in first.windows(2) {
        assert!(pair[0].record().end() <= pair[1].image_base());
    }
    for module in &first {
        assert!(os.contains(module.record()));
    }
    let bases: Vec<_> = first.iter().map(|m| m.image_base().value()).collect();
    assert_eq!(bases, vec![0x1000, 0x3000, 0x5000]);
}

#[test]
fn test_module_metadata_is_resolved_once()
{
    let script = DacScript::new(11);
    script.module_list(&[0x1040]);
    script.respond_at(DacRequest::ModuleData, 0x1040, module_data_bytes(0x1040, 0x1200, 0x300));
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(0x1000, 0x1000, "app.dll")];

    let runtime = runtime_with(target, &script);
    let module = &runtime.modules()[0];
    let metadata = runtime.module_metadata(module).unwrap();
    assert_eq!(metadata.metadata_start, Address::new(0x1200));
    assert_eq!(metadata.metadata_size, 0x300);
    assert!(metadata.is_pe_file);

    runtime.module_metadata(module);
    assert_eq!(script.count(DacRequest::ModuleData), 1);
}

// ============================================================================
// Threads
// ============================================================================

#[test]
fn test_thread_chain_is_walked_in_order()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 11), (0xb000, 12), (0xc000, 13)], 0xb000);

    let runtime = runtime_with(FakeTarget::x64(), &script);
    let threads = runtime.threads().unwrap();
    let found: Vec<_> = threads.iter().map(|t| t.address.value()).collect();
    assert_eq!(found, vec![0xa000, 0xb000, 0xc000]);
    assert_eq!(threads[2].os_thread_id, 13);
    assert!(threads[1].is_finalizer_thread);
    assert!(!threads[0].is_finalizer_thread);
    assert_eq!(threads[0].app_domain, Address::new(0xd000));
}

#[test]
fn test_thread_cycle_terminates()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 1), (0xb000, 2)], 0);
    // B links back to A
    script.respond_at(DacRequest::Thread, 0xb000, common::thread_bytes(2, 0, 0xa000));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert_eq!(runtime.threads().unwrap().len(), 2);
}

#[test]
fn test_unreadable_link_truncates()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 1), (0xb000, 2)], 0);
    script.respond_at(DacRequest::Thread, 0xb000, common::thread_bytes(2, 0, 0xdead));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert_eq!(runtime.threads().unwrap().len(), 2);
}

#[test]
fn test_strict_walk_reports_truncation()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 1)], 0);
    script.respond_at(DacRequest::Thread, 0xa000, common::thread_bytes(1, 0, 0xdead));

    let options = RuntimeOptions::builder().strict_thread_walk(true).build().unwrap();
    let runtime = ClrRuntime::with_options(Box::new(FakeTarget::x64()), script.channel(), options).unwrap();
    let err = runtime.threads().unwrap_err();
    assert_eq!(
        err,
        DacError::ThreadWalkTruncated {
            walked: 1,
            address: Address::new(0xdead),
        }
    );
}

#[test]
fn test_thread_limit_stops_walk()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 1), (0xb000, 2), (0xc000, 3)], 0);

    let options = RuntimeOptions::builder().thread_walk_limit(2).build().unwrap();
    let runtime = ClrRuntime::with_options(Box::new(FakeTarget::x64()), script.channel(), options).unwrap();
    assert_eq!(runtime.threads().unwrap().len(), 2);
}

#[test]
fn test_missing_thread_store_is_empty()
{
    let script = DacScript::new(11);
    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert!(runtime.threads().unwrap().is_empty());
}

#[test]
fn test_flush_forces_recomputation()
{
    let script = DacScript::new(11);
    script.thread_chain(&[(0xa000, 1)], 0);
    script.module_list(&[120]);
    script.respond_global(DacRequest::GcHeapData, gc_info_bytes(false, 1, 2));
    script.respond_global(DacRequest::GcHeapStaticDetails, heap_details_bytes(0, 0x10_000, 0, 0));
    script.respond_global(DacRequest::AppDomainStore, domain_store_bytes(0x100, 0x200, 1));
    script.respond(DacRequest::AppDomainList, &1u32.to_le_bytes(), pointers(&[0x300]));
    script.respond_at(DacRequest::AppDomainData, 0x300, app_domain_bytes(0x300, 1));
    let mut target = FakeTarget::x64();
    target.modules = vec![ModuleRecord::new(100, 50, "a.dll"), ModuleRecord::new(200, 50, "b.dll")];
    let mut runtime = runtime_with(target, &script);

    assert_eq!(runtime.threads().unwrap().len(), 1);
    assert_eq!(runtime.modules().len(), 1);
    assert_eq!(runtime.heap().unwrap().info.max_generation, 2);
    assert_eq!(runtime.app_domain().unwrap().id, 1);

    script.thread_chain(&[(0xa000, 1), (0xb000, 2)], 0);
    script.module_list(&[120, 220]);
    script.respond_global(DacRequest::GcHeapData, gc_info_bytes(false, 1, 3));
    script.respond_global(DacRequest::GcHeapStaticDetails, heap_details_bytes(0, 0x40_000, 0, 0));
    script.respond_global(DacRequest::AppDomainStore, domain_store_bytes(0x100, 0x200, 1));
    script.respond(DacRequest::AppDomainList, &1u32.to_le_bytes(), pointers(&[0x500]));
    script.respond_at(DacRequest::AppDomainData, 0x500, app_domain_bytes(0x500, 7));

    assert_eq!(runtime.threads().unwrap().len(), 1, "cached until flushed");
    assert_eq!(runtime.modules().len(), 1);
    assert_eq!(runtime.heap().unwrap().info.max_generation, 2);
    assert_eq!(runtime.heap().unwrap().heaps[0].generations[2].start_segment, Address::new(0x10_000));
    assert_eq!(runtime.app_domain().unwrap().id, 1);

    runtime.flush();
    assert_eq!(runtime.threads().unwrap().len(), 2);
    let bases: Vec<_> = runtime.modules().iter().map(|m| m.image_base().value()).collect();
    assert_eq!(bases, vec![100, 200]);
    assert_eq!(runtime.heap().unwrap().info.max_generation, 3);
    assert_eq!(runtime.heap().unwrap().heaps[0].generations[2].start_segment, Address::new(0x40_000));
    let domain = runtime.app_domain().unwrap();
    assert_eq!(domain.address, Address::new(0x500));
    assert_eq!(domain.id, 7);

    assert_eq!(script.count(DacRequest::ThreadStore), 2);
    assert_eq!(script.count(DacRequest::ModuleCount), 2);
    assert_eq!(script.count(DacRequest::GcHeapData), 2);
    assert_eq!(script.count(DacRequest::AppDomainStore), 2);
}

// ============================================================================
// App domains
// ============================================================================

#[test]
fn test_app_domain_resolution()
{
    let script = DacScript::new(11);
    script.respond_global(DacRequest::AppDomainStore, domain_store_bytes(0x100, 0x200, 2));
    script.respond(DacRequest::AppDomainList, &2u32.to_le_bytes(), pointers(&[0x300, 0x400]));
    script.respond_at(DacRequest::AppDomainData, 0x300, app_domain_bytes(0x300, 1));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    let domain = runtime.app_domain().unwrap();
    assert_eq!(domain.address, Address::new(0x300));
    assert_eq!(domain.id, 1);
    assert_eq!(domain.assembly_count, 3);
    assert_eq!(runtime.system_domain(), Some(Address::new(0x200)));
    assert_eq!(runtime.shared_domain(), Some(Address::new(0x100)));

    runtime.app_domain();
    assert_eq!(script.count(DacRequest::AppDomainStore), 1);
}

#[test]
fn test_no_user_domains()
{
    let script = DacScript::new(11);
    script.respond_global(DacRequest::AppDomainStore, domain_store_bytes(0, 0x200, 0));
    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert!(runtime.app_domain().is_none());
    assert_eq!(runtime.shared_domain(), None);
    assert_eq!(script.count(DacRequest::AppDomainList), 0);
}

// ============================================================================
// Heap
// ============================================================================

#[test]
fn test_workstation_heap_and_segments()
{
    let script = DacScript::new(11);
    script.respond_global(DacRequest::GcHeapData, gc_info_bytes(false, 1, 2));
    script.respond_global(DacRequest::GcHeapStaticDetails, heap_details_bytes(0, 0x10_000, 0x20_000, 0x11_000));
    script.respond_at(DacRequest::HeapSegment, 0x10_000, segment_bytes(0x10_000, 0x10_100, 0x10_800, 0x11_000));
    script.respond_at(DacRequest::HeapSegment, 0x11_000, segment_bytes(0x11_000, 0x11_100, 0x11_400, 0));
    script.respond_at(DacRequest::HeapSegment, 0x20_000, segment_bytes(0x20_000, 0x20_100, 0x28_000, 0));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    let heap = runtime.heap().unwrap();
    assert!(!heap.info.server_mode);
    assert_eq!(heap.heaps.len(), 1);

    let segments = runtime.segments();
    assert_eq!(segments.len(), 3);
    assert!(!segments[0].is_large);
    assert!(segments[1].is_ephemeral);
    assert!(segments[2].is_large);
    assert_eq!(segments[2].record.allocated_size(), 0x28_000 - 0x20_100);
}

#[test]
fn test_segment_cycle_terminates()
{
    let script = DacScript::new(11);
    script.respond_global(DacRequest::GcHeapData, gc_info_bytes(false, 1, 2));
    script.respond_global(DacRequest::GcHeapStaticDetails, heap_details_bytes(0, 0x10_000, 0, 0));
    script.respond_at(DacRequest::HeapSegment, 0x10_000, segment_bytes(0x10_000, 0x10_100, 0x10_800, 0x11_000));
    script.respond_at(DacRequest::HeapSegment, 0x11_000, segment_bytes(0x11_000, 0x11_100, 0x11_400, 0x10_000));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert_eq!(runtime.segments().len(), 2);
}

#[test]
fn test_server_heaps()
{
    let script = DacScript::new(11);
    script.respond_global(DacRequest::GcHeapData, gc_info_bytes(true, 2, 2));
    script.respond_global(DacRequest::GcHeapList, pointers(&[0xe000, 0xf000]));
    script.respond_at(DacRequest::GcHeapDetails, 0xe000, heap_details_bytes(0xe000, 0, 0, 0));
    script.respond_at(DacRequest::GcHeapDetails, 0xf000, heap_details_bytes(0xf000, 0, 0, 0));

    let runtime = runtime_with(FakeTarget::x64(), &script);
    let heap = runtime.heap().unwrap();
    assert!(heap.info.server_mode);
    let heaps: Vec<_> = heap.heaps.iter().map(|h| h.heap_address.value()).collect();
    assert_eq!(heaps, vec![0xe000, 0xf000]);
    assert_eq!(runtime.heap_details(Some(Address::new(0xf000))).unwrap().heap_address, Address::new(0xf000));
    assert!(runtime.segments().is_empty());
}

#[test]
fn test_missing_gc_info_has_no_heap()
{
    let script = DacScript::new(11);
    let runtime = runtime_with(FakeTarget::x64(), &script);
    assert!(runtime.heap().is_none());
    assert!(runtime.segments().is_empty());
}

// ============================================================================
// Unsupported surface
// ============================================================================

#[test]
fn test_unsupported_operations_are_distinguishable()
{
    let script = DacScript::new(11);
    let runtime = runtime_with(FakeTarget::x64(), &script);

    assert!(runtime.enumerate_handles().unwrap_err().is_unsupported());
    assert!(runtime.enumerate_memory_regions().unwrap_err().is_unsupported());
    assert!(runtime.method_by_ip(Address::new(0x1000)).unwrap_err().is_unsupported());
    assert!(runtime.gc_threads().unwrap_err().is_unsupported());
    assert_eq!(
        runtime.ccw_data(Address::new(0x2000)).unwrap_err(),
        DacError::Unsupported { operation: "ccw_data" }
    );
}
