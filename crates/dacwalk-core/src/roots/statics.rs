//! Static field roots.

use tracing::{debug, warn};

use crate::dac::DacLibrary;
use crate::error::Result;
use crate::target::DataTarget;
use crate::types::{Root, RootKind};

/// Enumerate every static root
///
/// With `resolve_names`, each root carries the name the native side supplied or,
/// failing that, whatever the target resolves for the storage address. Without it,
/// no root carries a name.
///
/// ## Errors
///
/// - `MissingInterface`: The component does not expose root traversal
pub(crate) fn enumerate(target: &dyn DataTarget, dac: &DacLibrary, resolve_names: bool) -> Result<Vec<Root>>
{
    let traversal = dac.root_traversal()?;

    let mut roots = Vec::new();
    let result = traversal.traverse_static_roots(resolve_names, &mut |raw| {
        let mut root = Root::new(RootKind::Static, raw.address, raw.object, raw.type_handle);
        root.app_domain = raw.app_domain;
        if resolve_names {
            root.name = raw.name.or_else(|| target.resolve_symbol(raw.address));
        }
        roots.push(root);
    });

    if let Err(err) = result {
        warn!(%err, collected = roots.len(), "static root traversal failed");
    }
    debug!(count = roots.len(), resolve_names, "enumerated static roots");
    Ok(roots)
}
