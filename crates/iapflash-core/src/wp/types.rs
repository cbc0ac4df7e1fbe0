//! Write protection types and structures
//!
//! This module provides the option byte image and the status types
//! returned by the protection operations.

/// Read protection level
///
/// Encoded like the STM32 RDP option byte: `0xAA` is level 0, `0xCC` is
/// level 2 and every other value means level 1. Serialized as the raw
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "u8", into = "u8")
)]
pub enum RdpLevel {
    /// Level 0 - no read protection
    #[default]
    Level0,
    /// Level 1 - flash reads blocked while a debugger is attached
    Level1,
    /// Level 2 - debug permanently disabled, option bytes frozen
    Level2,
}

impl RdpLevel {
    /// Decode the raw RDP option byte
    pub const fn from_byte(value: u8) -> Self {
        match value {
            0xAA => Self::Level0,
            0xCC => Self::Level2,
            _ => Self::Level1,
        }
    }

    /// Raw RDP option byte for this level
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Level0 => 0xAA,
            Self::Level1 => 0xBB,
            Self::Level2 => 0xCC,
        }
    }
}

impl From<u8> for RdpLevel {
    fn from(value: u8) -> Self {
        Self::from_byte(value)
    }
}

impl From<RdpLevel> for u8 {
    fn from(level: RdpLevel) -> Self {
        level.to_byte()
    }
}

impl core::fmt::Display for RdpLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdpLevel::Level0 => write!(f, "level 0"),
            RdpLevel::Level1 => write!(f, "level 1"),
            RdpLevel::Level2 => write!(f, "level 2"),
        }
    }
}

/// Option byte image
///
/// Option bytes persist across resets. They cannot be changed bit by bit:
/// the whole area is erased and the complete desired image programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionBytes {
    /// Write-protected page groups, one bit per group (set = protected)
    pub write_protected: u32,
    /// Read protection level
    pub rdp: RdpLevel,
    /// User configuration bits (watchdog, reset and boot options)
    pub user: u8,
}

impl OptionBytes {
    /// Option bytes as left by an option byte erase
    pub const ERASED: Self = Self {
        write_protected: 0,
        rdp: RdpLevel::Level0,
        user: 0xFF,
    };

    /// Copy of these option bytes with a different protection bitmap
    pub const fn with_write_protected(self, write_protected: u32) -> Self {
        Self {
            write_protected,
            rdp: self.rdp,
            user: self.user,
        }
    }
}

impl Default for OptionBytes {
    fn default() -> Self {
        Self::ERASED
    }
}

/// Write protection status of the page groups the engine manages
///
/// **The sense is inverted**: a set bit means the page group is *not*
/// write protected. Bits outside the memory map's `protected_pages_mask`
/// are always clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionStatus {
    unprotected: u32,
    mask: u32,
}

impl ProtectionStatus {
    /// Compute the status from a protection bitmap (set = protected)
    pub const fn from_write_protected(write_protected: u32, mask: u32) -> Self {
        Self {
            unprotected: !write_protected & mask,
            mask,
        }
    }

    /// Raw status bitmask (set = page group unprotected)
    pub const fn bits(&self) -> u32 {
        self.unprotected
    }

    /// Page groups the status covers
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    /// Page groups of interest that are currently protected
    pub const fn protected_groups(&self) -> u32 {
        !self.unprotected & self.mask
    }

    /// Check if no page group of interest is protected
    pub const fn is_fully_unprotected(&self) -> bool {
        self.unprotected == self.mask
    }

    /// Check if every page group of interest is protected
    pub const fn is_fully_protected(&self) -> bool {
        self.unprotected == 0
    }
}

impl core::fmt::Display for ProtectionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_fully_unprotected() {
            write!(f, "unprotected (0x{:08X})", self.unprotected)
        } else if self.is_fully_protected() {
            write!(f, "protected (0x{:08X})", self.unprotected)
        } else {
            write!(
                f,
                "partially protected (unprotected 0x{:08X}, protected 0x{:08X})",
                self.unprotected,
                self.protected_groups()
            )
        }
    }
}

/// Result of a successful [`disable_protection`](super::disable_protection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    /// Option bytes were rewritten with the managed pages unprotected
    Disabled,
    /// Nothing to do, the managed pages were not protected
    AlreadyUnprotected,
}

/// Result of a successful [`enable_protection`](super::enable_protection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// Option bytes were rewritten with the managed pages protected
    Enabled,
    /// Nothing to do, the managed pages were already protected
    AlreadyProtected,
}
