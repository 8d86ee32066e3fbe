//! # Runtime Options
//!
//! Policy knobs for a [`crate::ClrRuntime`] session.
//!
//! The defaults favour getting as much out of a damaged target as possible: a broken
//! thread list is truncated rather than rejected, and roots are reported exactly as
//! the data-access component produced them.
//!
//! ## Environment
//!
//! [`RuntimeOptions::from_env`] reads:
//!
//! - `DACWALK_THREAD_LIMIT`: maximum number of threads to walk (decimal or `0x` hex)
//! - `DACWALK_STRICT_THREADS`: `1`/`true` to fail on a broken thread list
//! - `DACWALK_VERIFY_ROOTS`: `1`/`true` to drop roots whose address is unreadable

use std::env;

use crate::error::{DacError, Result};

/// Default upper bound on the number of threads materialized from the thread list
pub const DEFAULT_THREAD_WALK_LIMIT: usize = 0x10000;

const THREAD_LIMIT_VAR: &str = "DACWALK_THREAD_LIMIT";
const STRICT_THREADS_VAR: &str = "DACWALK_STRICT_THREADS";
const VERIFY_ROOTS_VAR: &str = "DACWALK_VERIFY_ROOTS";

/// Session policy for a runtime facade
///
/// ```rust
/// use dacwalk_core::config::RuntimeOptions;
///
/// let options = RuntimeOptions::builder().strict_thread_walk(true).thread_walk_limit(512).build()?;
/// assert!(options.strict_thread_walk);
/// assert_eq!(options.thread_walk_limit, 512);
/// # Ok::<(), dacwalk_core::error::DacError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions
{
    /// Stop the thread walk after this many threads
    pub thread_walk_limit: usize,
    /// Fail with `ThreadWalkTruncated` instead of returning a partial thread list
    pub strict_thread_walk: bool,
    /// Drop roots whose address cannot be read through the data target
    pub verify_root_addresses: bool,
}

impl Default for RuntimeOptions
{
    fn default() -> Self
    {
        Self {
            thread_walk_limit: DEFAULT_THREAD_WALK_LIMIT,
            strict_thread_walk: false,
            verify_root_addresses: false,
        }
    }
}

impl RuntimeOptions
{
    /// Start from the defaults
    pub fn builder() -> RuntimeOptionsBuilder
    {
        RuntimeOptionsBuilder::default()
    }

    /// Defaults overridden by any `DACWALK_*` variables that are set
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: A variable is set but cannot be parsed
    pub fn from_env() -> Result<Self>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`RuntimeOptions::from_env`] with an arbitrary variable source
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self>
    {
        let mut builder = Self::builder();
        if let Some(raw) = lookup(THREAD_LIMIT_VAR) {
            builder = builder.thread_walk_limit(parse_count(THREAD_LIMIT_VAR, &raw)?);
        }
        if let Some(raw) = lookup(STRICT_THREADS_VAR) {
            builder = builder.strict_thread_walk(parse_flag(STRICT_THREADS_VAR, &raw)?);
        }
        if let Some(raw) = lookup(VERIFY_ROOTS_VAR) {
            builder = builder.verify_root_addresses(parse_flag(VERIFY_ROOTS_VAR, &raw)?);
        }
        builder.build()
    }
}

/// Builder for [`RuntimeOptions`]
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptionsBuilder
{
    options: RuntimeOptions,
}

impl RuntimeOptionsBuilder
{
    /// Maximum number of threads to walk
    #[must_use]
    pub fn thread_walk_limit(mut self, limit: usize) -> Self
    {
        self.options.thread_walk_limit = limit;
        self
    }

    /// Fail on a broken thread list instead of truncating
    #[must_use]
    pub fn strict_thread_walk(mut self, strict: bool) -> Self
    {
        self.options.strict_thread_walk = strict;
        self
    }

    /// Drop roots whose address is not readable
    #[must_use]
    pub fn verify_root_addresses(mut self, verify: bool) -> Self
    {
        self.options.verify_root_addresses = verify;
        self
    }

    /// Validate and produce the options
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: `thread_walk_limit` is zero
    pub fn build(self) -> Result<RuntimeOptions>
    {
        if self.options.thread_walk_limit == 0 {
            return Err(DacError::InvalidArgument("thread_walk_limit must be at least 1".to_string()));
        }
        Ok(self.options)
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize>
{
    let trimmed = raw.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| DacError::InvalidArgument(format!("{name}: '{raw}' is not a count")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool>
{
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(DacError::InvalidArgument(format!("{name}: '{raw}' is not a boolean"))),
    }
}
