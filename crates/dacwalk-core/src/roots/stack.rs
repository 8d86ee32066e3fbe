//! Stack roots for one thread.

use tracing::{debug, trace, warn};

use crate::dac::DacLibrary;
use crate::error::{DacError, Result};
use crate::target::DataTarget;
use crate::types::{Root, RootKind, ThreadRecord};

/// Enumerate the roots in one thread's managed frames
///
/// The architecture is checked before anything is asked of the data-access
/// component. A thread without an OS thread, or whose register state cannot be
/// read, has no walkable stack and yields no roots.
///
/// ## Errors
///
/// - `UnsupportedArchitecture`: No register context layout for the target
/// - `MissingInterface`: The component does not expose root traversal
pub(crate) fn enumerate(target: &dyn DataTarget, dac: &DacLibrary, thread: &ThreadRecord) -> Result<Vec<Root>>
{
    let architecture = target.architecture();
    let (Some(size), Some(flags)) = (architecture.context_size(), architecture.context_flags()) else {
        return Err(DacError::UnsupportedArchitecture(architecture));
    };
    let traversal = dac.root_traversal()?;

    if !thread.is_alive() {
        trace!(thread = %thread.address, "thread has no OS thread, skipping stack walk");
        return Ok(Vec::new());
    }

    let mut context = match target.thread_context(thread.os_thread_id, flags, size) {
        Ok(context) => context,
        Err(err) => {
            warn!(os_thread_id = thread.os_thread_id, %err, "thread context unavailable, no stack roots");
            return Ok(Vec::new());
        }
    };
    // The native walker reads exactly `size` bytes.
    context.resize(size, 0);

    let mut roots = Vec::new();
    let result = traversal.traverse_stack_roots(thread.address, &mut context, &mut |raw| {
        let mut root = Root::new(RootKind::Stack, raw.address, raw.object, raw.type_handle);
        root.is_interior = raw.is_interior;
        root.is_pinned = raw.is_pinned;
        root.app_domain = thread.app_domain;
        root.os_thread_id = Some(thread.os_thread_id);
        roots.push(root);
    });
    drop(context);

    if let Err(err) = result {
        warn!(os_thread_id = thread.os_thread_id, %err, collected = roots.len(), "stack walk failed part way");
    }
    debug!(os_thread_id = thread.os_thread_id, count = roots.len(), "enumerated stack roots");
    Ok(roots)
}
