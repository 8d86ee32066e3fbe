//! Loaded module types.

use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;

use super::Address;

/// A module as reported by the OS loader (or the dump's module list)
///
/// The loader knows the exact image range and file path but nothing about the
/// managed runtime. Records are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRecord
{
    /// Base address the image is mapped at
    pub image_base: Address,
    /// Size of the mapped image in bytes
    pub file_size: u64,
    /// Path of the image file
    pub path: PathBuf,
}

impl ModuleRecord
{
    /// Create a new module record
    pub fn new(image_base: impl Into<Address>, file_size: u64, path: impl Into<PathBuf>) -> Self
    {
        Self {
            image_base: image_base.into(),
            file_size,
            path: path.into(),
        }
    }

    /// Exclusive end of the image range, saturating on bogus sizes
    pub fn end(&self) -> Address
    {
        self.image_base.saturating_add(self.file_size)
    }

    /// Check if an address lies within `[image_base, image_base + file_size)`
    ///
    /// ```rust
    /// use dacwalk_core::types::{Address, ModuleRecord};
    ///
    /// let module = ModuleRecord::new(100, 50, "clr.dll");
    /// assert!(module.contains(Address::from(100)));
    /// assert!(module.contains(Address::from(149)));
    /// assert!(!module.contains(Address::from(150)));
    /// ```
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.image_base && address < self.end()
    }

    /// File name component of the path, if any
    pub fn file_name(&self) -> Option<&str>
    {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Full path of the image
    pub fn path(&self) -> &Path
    {
        &self.path
    }
}

/// Runtime-side description of a module, decoded from a module data request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleData
{
    /// Runtime module object address
    pub address: Address,
    /// Loaded PE file object
    pub pe_file: Address,
    /// Base of the IL image
    pub il_base: Address,
    /// Start of the metadata blob
    pub metadata_start: Address,
    /// Size of the metadata blob in bytes
    pub metadata_size: u64,
    /// Owning assembly
    pub assembly: Address,
    /// Module was emitted through reflection and has no backing file
    pub is_reflection: bool,
    /// Module is backed by a PE file
    pub is_pe_file: bool,
}

/// A module confirmed present in the runtime's own bookkeeping
///
/// Produced by module correlation. Runtime metadata is resolved lazily the first
/// time [`crate::ClrRuntime::module_metadata`] is asked for it and kept for the
/// lifetime of the module table.
#[derive(Debug, Clone)]
pub struct RuntimeModule
{
    record: ModuleRecord,
    runtime_pointer: Option<Address>,
    pub(crate) metadata: OnceCell<Option<ModuleData>>,
}

impl RuntimeModule
{
    /// Wrap an OS module record confirmed by the given runtime pointer
    ///
    /// `runtime_pointer` is `None` when correlation degraded to the plain OS list.
    pub fn new(record: ModuleRecord, runtime_pointer: Option<Address>) -> Self
    {
        Self {
            record,
            runtime_pointer,
            metadata: OnceCell::new(),
        }
    }

    /// The OS-level record
    pub fn record(&self) -> &ModuleRecord
    {
        &self.record
    }

    /// Image base address
    pub fn image_base(&self) -> Address
    {
        self.record.image_base
    }

    /// Image size in bytes
    pub fn file_size(&self) -> u64
    {
        self.record.file_size
    }

    /// Image path
    pub fn path(&self) -> &Path
    {
        &self.record.path
    }

    /// The runtime pointer that confirmed this module
    pub fn runtime_pointer(&self) -> Option<Address>
    {
        self.runtime_pointer
    }
}

impl PartialEq for RuntimeModule
{
    fn eq(&self, other: &Self) -> bool
    {
        self.record == other.record && self.runtime_pointer == other.runtime_pointer
    }
}

impl Eq for RuntimeModule {}
