//! # Root Enumeration
//!
//! Three walkers that each drive one native traversal and collect what it reports
//! into [`Root`] values:
//!
//! - [`stack`]: one thread's managed frames, given its register context
//! - [`statics`]: every static field holding a reference
//! - [`handles`]: the strong entries of the handle table
//!
//! The native side owns the traversal; the walkers only translate items and apply
//! filtering. Each traversal borrows its sink for the duration of the call.

pub(crate) mod handles;
pub(crate) mod stack;
pub(crate) mod statics;

use tracing::debug;

use crate::target::DataTarget;
use crate::types::Root;

/// Drop roots whose address cannot be read through the target
pub(crate) fn retain_readable(target: &dyn DataTarget, roots: &mut Vec<Root>)
{
    let before = roots.len();
    roots.retain(|root| target.is_readable(root.address));
    let dropped = before - roots.len();
    if dropped > 0 {
        debug!(dropped, kept = roots.len(), "dropped roots with unreadable addresses");
    }
}
