//! Target address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed address in the target process
///
/// This wrapper around `u64` keeps target addresses apart from sizes, counts and
/// host pointers. The data-access protocol always transfers addresses as 64-bit
/// values, even when the target is a 32-bit process, so one representation covers
/// every supported architecture.
///
/// Zero is a legitimate value in this domain: it terminates linked lists and marks
/// absent fields in response records. Code that needs "no answer" distinct from
/// zero uses `Option<Address>` or a documented sentinel instead.
///
/// ## Example
///
/// ```rust
/// use dacwalk_core::types::Address;
///
/// let module = Address::from(0x7ff6_0000_0000);
/// let field = module + 0x3c;
/// assert_eq!(field.value(), 0x7ff6_0000_003c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// The highest representable address
    pub const MAX: Self = Address(u64::MAX);

    /// Create a new address from a `u64` value
    ///
    /// ```rust
    /// use dacwalk_core::types::Address;
    ///
    /// const HEAP_BASE: Address = Address::new(0x0000_01f0_0000_0000);
    /// assert!(!HEAP_BASE.is_null());
    /// ```
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Returns `true` for the null address
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ```rust
    /// use dacwalk_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at [`Address::MAX`]
    ///
    /// Range ends computed from untrusted sizes use this so that a bogus size
    /// cannot wrap a range around to low addresses.
    ///
    /// ```rust
    /// use dacwalk_core::types::Address;
    ///
    /// let addr = Address::from(u64::MAX - 4);
    /// assert_eq!(addr.saturating_add(0x100), Address::MAX);
    /// ```
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }

    /// Decode a little-endian address from exactly eight bytes
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self
    {
        Address(u64::from_le_bytes(bytes))
    }

    /// Encode this address as eight little-endian bytes
    ///
    /// This is the wire form used for request input buffers.
    pub const fn to_le_bytes(self) -> [u8; 8]
    {
        self.0.to_le_bytes()
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
