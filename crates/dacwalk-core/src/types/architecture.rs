//! Target CPU architecture and its register-context layout.

use std::fmt;

/// CPU architecture of the inspected process
///
/// The architecture decides how large the raw register context handed to the
/// data-access component's stack walker must be. The native side interprets the
/// buffer itself; this engine only has to size it correctly and ask the data
/// target to fill it.
///
/// ## Context Layouts
///
/// | Architecture | Context size | Flags requested |
/// |--------------|--------------|-----------------|
/// | x64          | 0x4D0        | `0x0010_001F`   |
/// | x86          | 0x2D0        | `0x0001_003F`   |
/// | ARM (32-bit) | 0x1A0        | `0x0020_000F`   |
///
/// ARM64 processes can be read, but no stack-walk context layout is defined for
/// them, so stack-root enumeration rejects them.
///
/// ## Example
///
/// ```rust
/// use dacwalk_core::types::Architecture;
///
/// let arch = Architecture::from_machine_type(0x8664);
/// assert_eq!(arch, Architecture::X64);
/// assert_eq!(arch.context_size(), Some(0x4D0));
/// assert_eq!(Architecture::Arm64.context_size(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 32-bit x86
    X86,
    /// 64-bit x86 (AMD64)
    X64,
    /// 32-bit ARM (Thumb-2)
    Arm,
    /// 64-bit ARM
    Arm64,
    /// Any other PE machine type, kept for diagnostics
    Unknown(u16),
}

/// PE machine type for x86
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
/// PE machine type for x64
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
/// PE machine type for ARM Thumb-2
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x01c4;
/// PE machine type for ARM64
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xAA64;

impl Architecture
{
    /// Map a PE machine type to an architecture
    #[must_use]
    pub const fn from_machine_type(machine: u16) -> Self
    {
        match machine {
            IMAGE_FILE_MACHINE_I386 => Architecture::X86,
            IMAGE_FILE_MACHINE_AMD64 => Architecture::X64,
            IMAGE_FILE_MACHINE_ARMNT => Architecture::Arm,
            IMAGE_FILE_MACHINE_ARM64 => Architecture::Arm64,
            other => Architecture::Unknown(other),
        }
    }

    /// Size in bytes of the register context the stack walker expects
    ///
    /// Returns `None` when no context layout is defined for the architecture.
    #[must_use]
    pub const fn context_size(self) -> Option<usize>
    {
        match self {
            Architecture::X64 => Some(0x4D0),
            Architecture::X86 => Some(0x2D0),
            Architecture::Arm => Some(0x1A0),
            Architecture::Arm64 | Architecture::Unknown(_) => None,
        }
    }

    /// Context flags requesting the full register set (`CONTEXT_ALL`)
    #[must_use]
    pub const fn context_flags(self) -> Option<u32>
    {
        match self {
            Architecture::X64 => Some(0x0010_001F),
            Architecture::X86 => Some(0x0001_003F),
            Architecture::Arm => Some(0x0020_000F),
            Architecture::Arm64 | Architecture::Unknown(_) => None,
        }
    }

    /// Size of a target pointer in bytes
    #[must_use]
    pub const fn pointer_size(self) -> usize
    {
        match self {
            Architecture::X86 | Architecture::Arm => 4,
            Architecture::X64 | Architecture::Arm64 | Architecture::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::X64 => write!(f, "x64"),
            Architecture::Arm => write!(f, "arm"),
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::Unknown(machine) => write!(f, "unknown (machine 0x{machine:04x})"),
        }
    }
}
