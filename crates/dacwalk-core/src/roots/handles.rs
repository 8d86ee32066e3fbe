//! Handle table roots.

use tracing::{debug, trace, warn};

use crate::dac::{DacLibrary, RawHandle};
use crate::error::Result;
use crate::types::{HandleKind, Root, RootKind};

/// Enumerate the handle table entries that keep their object alive
///
/// Weak handles, empty slots and ref-counted handles with a zero count are skipped.
/// Dependent handles carry their secondary object only when the negotiated protocol
/// reports extended handle data.
///
/// ## Errors
///
/// - `MissingInterface`: The component does not expose root traversal
pub(crate) fn enumerate(dac: &DacLibrary) -> Result<Vec<Root>>
{
    let traversal = dac.root_traversal()?;
    let extended = dac.capabilities().extended_handle_data;

    let mut roots = Vec::new();
    let mut skipped = 0usize;
    let result = traversal.traverse_handle_table(extended, &mut |raw| match to_root(&raw, extended) {
        Some(root) => roots.push(root),
        None => skipped += 1,
    });

    if let Err(err) = result {
        warn!(%err, collected = roots.len(), "handle table traversal failed");
    }
    debug!(count = roots.len(), skipped, extended, "enumerated handle roots");
    Ok(roots)
}

fn to_root(raw: &RawHandle, extended: bool) -> Option<Root>
{
    let kind = HandleKind::from_raw(raw.kind);
    if raw.object.is_null() || !kind.is_strong() {
        trace!(handle = %raw.address, ?kind, "not a root");
        return None;
    }
    if kind == HandleKind::RefCounted && raw.ref_count == 0 {
        return None;
    }

    let mut root = Root::new(RootKind::Handle, raw.address, raw.object, raw.type_handle);
    root.is_pinned = kind.is_pinned();
    root.app_domain = raw.app_domain;
    root.handle_kind = Some(kind);
    if extended && kind == HandleKind::Dependent && !raw.secondary.is_null() {
        root.dependent_target = Some(raw.secondary);
    }
    Some(root)
}
