//! # Data-Access Component Channel
//!
//! Byte-buffer-in, byte-buffer-out requests to the native component that understands
//! the runtime's internal layout, plus the callback traversals it drives for roots.
//!
//! ## Layers
//!
//! - [`DacChannel`]: the single request primitive. No payload interpretation.
//! - [`RootTraversal`]: native traversals that call back once per discovered item.
//! - [`DacLibrary`]: owns a channel, negotiates the protocol version once, and exposes
//!   the typed accessors (see `accessors.rs`). Nothing above this layer sees request
//!   ids or buffer layouts.
//! - [`ffi::NativeDac`]: a channel backed by a C ABI function table.
//!
//! ## Callback lifetime
//!
//! Traversal sinks are passed as `&mut dyn FnMut`. The borrow lasts exactly as long as
//! the traversal call, so the native side can never observe a sink that has already
//! been dropped, and the sink is released as soon as the call returns.

pub mod accessors;
pub mod ffi;
pub mod layout;
pub mod opcodes;

use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{DacError, Result};
use crate::types::Address;
pub use opcodes::DacRequest;

/// Protocol versions this engine can decode
pub const SUPPORTED_VERSIONS: [u32; 2] = [10, 11];

/// First protocol version that reports extended handle data
const EXTENDED_HANDLE_VERSION: u32 = 11;

/// A request the native side declined or failed to answer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("DAC request 0x{request:08x} failed with status 0x{status:08x}")]
pub struct RequestError
{
    /// Numeric request id
    pub request: u32,
    /// Native status code (an `HRESULT` on Windows shims)
    pub status: i32,
}

/// The raw request primitive
///
/// Implementations forward the request to the native component and copy its answer
/// into `output`. `output` is always exactly the size of the expected response.
pub trait DacChannel
{
    /// Issue one request
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] when the native side reports failure. The content
    /// of `output` is unspecified in that case.
    fn request(&self, request: u32, input: Option<&[u8]>, output: &mut [u8]) -> std::result::Result<(), RequestError>;

    /// The root traversal interface, if the native component exposes one
    ///
    /// The default implementation exposes none.
    fn root_traversal(&self) -> Option<&dyn RootTraversal>
    {
        None
    }
}

/// One stack root reported by the native stack walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStackRoot
{
    /// Stack slot (or register spill location) holding the reference
    pub address: Address,
    /// Referenced object
    pub object: Address,
    /// Type handle of the referenced object
    pub type_handle: Address,
    /// Reference may point into the middle of an object
    pub is_interior: bool,
    /// Referenced object is pinned
    pub is_pinned: bool,
}

/// One static root reported by the native statics traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStaticRoot
{
    /// Static field storage
    pub address: Address,
    /// Referenced object
    pub object: Address,
    /// Type handle of the referenced object
    pub type_handle: Address,
    /// App domain owning the static storage
    pub app_domain: Address,
    /// Name supplied by the native side when name resolution was requested
    pub name: Option<String>,
}

/// One handle table entry reported by the native handle traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle
{
    /// Handle address
    pub address: Address,
    /// Referenced object
    pub object: Address,
    /// Type handle of the referenced object
    pub type_handle: Address,
    /// Runtime handle type number
    pub kind: u32,
    /// Reference count (ref-counted handles only)
    pub ref_count: u32,
    /// Dependent handle secondary object (extended data only)
    pub secondary: Address,
    /// App domain owning the handle
    pub app_domain: Address,
}

/// Native traversals that report items through a callback
///
/// Each method returns once the native traversal is finished. The sink is invoked
/// synchronously, zero or more times, before the method returns.
pub trait RootTraversal
{
    /// Walk one thread's managed frames
    ///
    /// `context` is the thread's raw register context, sized for the architecture.
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] when the native walk fails.
    fn traverse_stack_roots(
        &self,
        thread: Address,
        context: &mut [u8],
        sink: &mut dyn FnMut(RawStackRoot),
    ) -> std::result::Result<(), RequestError>;

    /// Walk every static root
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] when the native walk fails.
    fn traverse_static_roots(
        &self,
        resolve_names: bool,
        sink: &mut dyn FnMut(RawStaticRoot),
    ) -> std::result::Result<(), RequestError>;

    /// Walk the handle table
    ///
    /// `extended` tells the native side whether extended handle data (dependent
    /// secondaries) may be reported.
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] when the native walk fails.
    fn traverse_handle_table(
        &self,
        extended: bool,
        sink: &mut dyn FnMut(RawHandle),
    ) -> std::result::Result<(), RequestError>;
}

/// Capabilities derived from the negotiated protocol version
///
/// Computed once when the library is created; accessors consult this instead of
/// checking version numbers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacCapabilities
{
    /// Negotiated protocol version (10 or 11)
    pub version: u32,
    /// Handle traversal reports dependent-handle secondaries
    pub extended_handle_data: bool,
}

impl DacCapabilities
{
    /// Capabilities for a supported version
    ///
    /// ## Errors
    ///
    /// - `UnsupportedDacVersion`: Anything other than 10 or 11
    pub fn for_version(version: u32) -> Result<Self>
    {
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DacError::UnsupportedDacVersion(version));
        }
        Ok(Self {
            version,
            extended_handle_data: version >= EXTENDED_HANDLE_VERSION,
        })
    }
}

/// A negotiated connection to the data-access component
///
/// Owns the channel for the session. Creating one issues the version request; every
/// typed accessor is only reachable afterwards.
pub struct DacLibrary
{
    channel: Box<dyn DacChannel>,
    capabilities: DacCapabilities,
}

impl std::fmt::Debug for DacLibrary
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("DacLibrary")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl DacLibrary
{
    /// Negotiate the protocol version over `channel`
    ///
    /// ## Errors
    ///
    /// - `VersionRequestFailed`: The version request failed
    /// - `UnsupportedDacVersion`: The component speaks a version other than 10 or 11
    pub fn new(channel: Box<dyn DacChannel>) -> Result<Self>
    {
        let mut buffer = [0u8; layout::VERSION_SIZE];
        channel
            .request(DacRequest::Version.id(), None, &mut buffer)
            .map_err(|err| {
                debug!(%err, "version request failed");
                DacError::VersionRequestFailed
            })?;

        let version = u32::from_le_bytes(buffer);
        let capabilities = DacCapabilities::for_version(version)?;
        debug!(version, extended_handle_data = capabilities.extended_handle_data, "negotiated DAC protocol");

        Ok(Self { channel, capabilities })
    }

    /// Capabilities negotiated at creation
    pub fn capabilities(&self) -> DacCapabilities
    {
        self.capabilities
    }

    /// Negotiated protocol version
    pub fn version(&self) -> u32
    {
        self.capabilities.version
    }

    /// Resolve the root traversal interface
    ///
    /// ## Errors
    ///
    /// - `MissingInterface`: The native component does not expose root traversal
    pub fn root_traversal(&self) -> Result<&dyn RootTraversal>
    {
        self.channel.root_traversal().ok_or(DacError::MissingInterface("root traversal"))
    }

    /// Issue one request into a freshly allocated buffer of `size` bytes
    fn raw_request(&self, request: DacRequest, input: Option<&[u8]>, size: usize) -> Option<Vec<u8>>
    {
        let mut output = vec![0u8; size];
        match self.channel.request(request.id(), input, &mut output) {
            Ok(()) => {
                trace!(%request, size, "request succeeded");
                Some(output)
            }
            Err(err) => {
                trace!(%request, status = err.status, "request failed");
                None
            }
        }
    }
}
