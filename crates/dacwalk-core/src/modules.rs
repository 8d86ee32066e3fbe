//! # Module Correlation
//!
//! Merges the OS loader's module list with the runtime's own module bookkeeping.
//!
//! The loader knows every mapped image, managed or not. The runtime knows which
//! images it loaded but reports only opaque module pointers that land somewhere inside
//! each image. Walking both lists in address order keeps exactly the loader modules
//! that contain at least one runtime pointer.
//!
//! ## Degraded mode
//!
//! If the runtime cannot report its module pointers (either request fails), the
//! result is the sorted loader list with no runtime pointers attached. A runtime
//! that answers with zero pointers confirms no module, so the table is empty.

use tracing::{debug, warn};

use crate::dac::DacLibrary;
use crate::target::DataTarget;
use crate::types::{Address, ModuleRecord, RuntimeModule};

/// Build the runtime module table for one session
pub(crate) fn correlate(target: &dyn DataTarget, dac: &DacLibrary) -> Vec<RuntimeModule>
{
    let modules = target.enumerate_modules();
    match dac.module_pointers() {
        Some(mut pointers) => {
            let os_count = modules.len();
            let correlated = correlate_records(modules, &mut pointers);
            debug!(
                os_modules = os_count,
                runtime_pointers = pointers.len(),
                kept = correlated.len(),
                "correlated module table"
            );
            correlated
        }
        None => {
            warn!("runtime module list unavailable, using the OS module list as-is");
            degraded(modules)
        }
    }
}

/// Keep the OS modules that contain at least one runtime pointer
///
/// Both inputs are sorted here; the output is ordered by image base and never
/// contains overlapping ranges.
///
/// ```rust
/// use dacwalk_core::modules::correlate_records;
/// use dacwalk_core::types::{Address, ModuleRecord};
///
/// let modules = vec![ModuleRecord::new(200, 50, "b.dll"), ModuleRecord::new(100, 50, "a.dll")];
/// let mut pointers = vec![Address::from(500), Address::from(120)];
///
/// let kept = correlate_records(modules, &mut pointers);
/// assert_eq!(kept.len(), 1);
/// assert_eq!(kept[0].image_base(), Address::from(100));
/// assert_eq!(kept[0].runtime_pointer(), Some(Address::from(120)));
/// ```
pub fn correlate_records(mut modules: Vec<ModuleRecord>, pointers: &mut [Address]) -> Vec<RuntimeModule>
{
    modules.sort_by_key(|module| module.image_base);
    pointers.sort_unstable();

    let mut kept: Vec<RuntimeModule> = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < modules.len() && j < pointers.len() {
        let module = &modules[i];
        let pointer = pointers[j];

        if pointer < module.image_base {
            j += 1;
        } else if module.contains(pointer) {
            push_disjoint(&mut kept, module.clone(), Some(pointer));
            i += 1;
            j += 1;
        } else {
            // Pointer lies past this module; the next module gets the same pointer.
            i += 1;
        }
    }

    kept
}

fn degraded(mut modules: Vec<ModuleRecord>) -> Vec<RuntimeModule>
{
    modules.sort_by_key(|module| module.image_base);
    let mut kept = Vec::with_capacity(modules.len());
    for module in modules {
        push_disjoint(&mut kept, module, None);
    }
    kept
}

/// Append unless the module starts inside the previously kept one
fn push_disjoint(kept: &mut Vec<RuntimeModule>, module: ModuleRecord, pointer: Option<Address>)
{
    if let Some(last) = kept.last() {
        if module.image_base < last.record().end() {
            warn!(
                base = %module.image_base,
                path = %module.path.display(),
                "module overlaps {}, skipping",
                last.path().display()
            );
            return;
        }
    }
    kept.push(RuntimeModule::new(module, pointer));
}
