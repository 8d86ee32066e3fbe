//! # Thread Walker
//!
//! Materializes the runtime's thread list by following `next_thread` links from the
//! thread store.
//!
//! The list lives in target memory and may be torn (a dump captured while a thread
//! was being created) or even cyclic. The walk stops at:
//!
//! - a zero link (normal end)
//! - an address already visited (cycle)
//! - a link whose thread request fails (truncation)
//! - the configured thread limit
//!
//! Only truncation is treated differently by strict mode, which reports it as
//! [`DacError::ThreadWalkTruncated`] instead of returning the partial list.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::RuntimeOptions;
use crate::dac::DacLibrary;
use crate::error::{DacError, Result};
use crate::types::ThreadRecord;

/// Walk the thread list
///
/// A missing thread store yields an empty list.
///
/// ## Errors
///
/// - `ThreadWalkTruncated`: A link could not be read and strict walking is enabled
pub(crate) fn walk_threads(dac: &DacLibrary, options: &RuntimeOptions) -> Result<Vec<ThreadRecord>>
{
    let Some(store) = dac.thread_store() else {
        warn!("thread store unavailable, no threads");
        return Ok(Vec::new());
    };

    let capacity = usize::try_from(store.thread_count).unwrap_or(0).min(options.thread_walk_limit);
    let mut threads = Vec::with_capacity(capacity);
    let mut visited = HashSet::with_capacity(capacity);
    let mut next = store.first_thread;

    while !next.is_null() {
        if threads.len() >= options.thread_walk_limit {
            warn!(limit = options.thread_walk_limit, "thread walk limit reached");
            break;
        }
        if !visited.insert(next) {
            warn!(address = %next, walked = threads.len(), "thread list cycles, stopping");
            break;
        }

        let Some(mut thread) = dac.thread(next) else {
            if options.strict_thread_walk {
                return Err(DacError::ThreadWalkTruncated {
                    walked: threads.len(),
                    address: next,
                });
            }
            warn!(address = %next, walked = threads.len(), "thread list truncated at unreadable link");
            break;
        };

        thread.is_finalizer_thread = thread.address == store.finalizer_thread;
        next = thread.next_thread;
        threads.push(thread);
    }

    debug!(
        count = threads.len(),
        reported = store.thread_count,
        "walked thread list"
    );
    Ok(threads)
}
