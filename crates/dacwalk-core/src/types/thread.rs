//! Managed thread types.

use super::Address;

/// Head of the runtime's thread list, decoded from one thread-store request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadStoreSummary
{
    /// Number of threads the runtime believes it owns
    pub thread_count: i32,
    /// Threads created but not started
    pub unstarted_count: i32,
    /// Background threads
    pub background_count: i32,
    /// Threads pending start
    pub pending_count: i32,
    /// Dead threads not yet collected
    pub dead_count: i32,
    /// First runtime thread object (zero when the list is empty)
    pub first_thread: Address,
    /// The finalizer thread object
    pub finalizer_thread: Address,
    /// The dedicated GC thread object (server GC only)
    pub gc_thread: Address,
}

/// One runtime thread, decoded from a per-thread request
///
/// `next_thread` links to the following record; zero terminates the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRecord
{
    /// Runtime thread object address
    pub address: Address,
    /// Managed thread id
    pub managed_thread_id: u32,
    /// OS thread id (zero for threads not yet started or already dead)
    pub os_thread_id: u32,
    /// Raw runtime thread state bits
    pub state: u32,
    /// Preemptive GC mode is disabled (thread is in cooperative mode)
    pub preemptive_gc_disabled: bool,
    /// Current allocation context pointer
    pub alloc_context_pointer: Address,
    /// Current allocation context limit
    pub alloc_context_limit: Address,
    /// App domain the thread currently runs in
    pub app_domain: Address,
    /// Topmost explicit frame
    pub frame: Address,
    /// Number of monitors held
    pub lock_count: u32,
    /// Thread environment block
    pub teb: Address,
    /// Handle to the last thrown exception object
    pub last_thrown_object_handle: Address,
    /// Next runtime thread in the list
    pub next_thread: Address,
    /// This is the runtime's finalizer thread
    pub is_finalizer_thread: bool,
}

impl ThreadRecord
{
    /// A thread without an OS thread id has no register state to walk
    pub const fn is_alive(&self) -> bool
    {
        self.os_thread_id != 0
    }
}
