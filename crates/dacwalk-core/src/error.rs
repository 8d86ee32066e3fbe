//! # Error Types
//!
//! Error handling for the introspection engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Only conditions that make an operation meaningless are errors. A single typed
//! request failing (one thread, one segment, one method table) is a normal outcome when
//! reading a possibly inconsistent target, and is reported as `None` by the accessors.

use crate::types::{Address, Architecture};

use thiserror::Error;

/// Main error type for introspection operations
///
/// ## Error Categories
///
/// 1. **Initialization errors**: UnsupportedDacVersion, VersionRequestFailed, MissingInterface
/// 2. **Configuration errors**: UnsupportedArchitecture, InvalidArgument
/// 3. **Unsupported surface**: Unsupported
/// 4. **Target errors**: ReadFailed, ThreadWalkTruncated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DacError
{
    /// The data-access component speaks a protocol version this engine cannot decode
    ///
    /// Only versions 10 and 11 are understood. Any other value means the response
    /// layouts cannot be trusted, so there is no degraded mode.
    #[error("Unsupported DAC protocol version {0} (expected 10 or 11)")]
    UnsupportedDacVersion(u32),

    /// The version request itself failed
    ///
    /// The native component is loaded but could not answer the very first request.
    #[error("DAC version request failed")]
    VersionRequestFailed,

    /// The native component does not expose an interface this operation needs
    ///
    /// This indicates a mismatch between this library and the native component,
    /// not a transient failure.
    #[error("DAC does not expose the {0} interface")]
    MissingInterface(&'static str),

    /// Stack walks need a CPU context layout for the target architecture
    ///
    /// There is no generic fallback layout; x64, x86 and ARM are supported.
    #[error("Unsupported architecture for stack walking: {0}")]
    UnsupportedArchitecture(Architecture),

    /// The operation exists on the facade but is not implemented by this engine
    ///
    /// Distinct from an empty result: callers can tell "not supported by this
    /// runtime flavor" apart from "legitimately nothing there".
    #[error("Operation not supported by this runtime: {operation}")]
    Unsupported
    {
        /// Name of the unsupported operation
        operation: &'static str,
    },

    /// Raw memory read through the data target failed
    #[error("Failed to read {len} bytes at {address}")]
    ReadFailed
    {
        /// Start of the failed read
        address: Address,
        /// Number of bytes requested
        len: usize,
    },

    /// The thread list could not be walked to its end
    ///
    /// Only raised when strict thread walking is enabled; by default the walk
    /// returns whatever it discovered before the broken link.
    #[error("Thread list truncated after {walked} threads at {address}")]
    ThreadWalkTruncated
    {
        /// Number of threads materialized before the failure
        walked: usize,
        /// Address of the link that could not be read
        address: Address,
    },

    /// Invalid argument or configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DacError
{
    /// Returns `true` for the "operation not supported" signal
    ///
    /// ```rust
    /// use dacwalk_core::error::DacError;
    ///
    /// let err = DacError::Unsupported { operation: "enumerate_handles" };
    /// assert!(err.is_unsupported());
    /// assert!(!DacError::VersionRequestFailed.is_unsupported());
    /// ```
    #[must_use]
    pub const fn is_unsupported(&self) -> bool
    {
        matches!(self, DacError::Unsupported { .. })
    }

    /// Returns `true` for errors that make the engine itself unusable
    #[must_use]
    pub const fn is_fatal(&self) -> bool
    {
        matches!(
            self,
            DacError::UnsupportedDacVersion(_) | DacError::VersionRequestFailed | DacError::MissingInterface(_)
        )
    }
}

/// Convenience type alias for `Result<T, DacError>`
///
/// ```rust
/// use dacwalk_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DacError>;
