//! Memory map of the on-chip flash
//!
//! The memory map fixes the constants every engine operation is
//! parameterized by: page size, the bounds of the user area the engine may
//! erase and program, and which write-protection bits guard that area.
//!
//! ```text
//!  flash_base                 user_start                         user_end   flash end
//!  |<------ bootloader ------>|<------------ user area ------------>|         |
//!  |  pg 0 | pg 1 | ...       |  pg n | ...                 | pg m  |         |
//! ```

#[cfg(feature = "std")]
mod toml;

use crate::error::Error;

/// Size of one programmable flash word in bytes
pub const WORD_SIZE: u32 = 4;

/// Flash memory map constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// Address of the first byte of flash
    pub flash_base: u32,
    /// Total flash size in bytes
    pub flash_size: u32,
    /// Bytes per erasable page
    pub page_size: u32,
    /// First address of the user area (inclusive, page aligned)
    pub user_start: u32,
    /// End of the user area (exclusive, page aligned)
    pub user_end: u32,
    /// Number of consecutive pages guarded by one write-protection bit
    pub pages_per_wrp_bit: u32,
    /// Write-protection bits the engine manages
    pub protected_pages_mask: u32,
}

impl MemoryMap {
    /// STM32F0 device with 64 KiB of flash and an IAP bootloader in the
    /// first 12 KiB
    pub const fn stm32f0_64k() -> Self {
        Self {
            flash_base: 0x0800_0000,
            flash_size: 64 * 1024,
            page_size: 1024,
            user_start: 0x0800_3000,
            user_end: 0x0801_0000,
            pages_per_wrp_bit: 4,
            protected_pages_mask: 0x0000_FFF8,
        }
    }

    /// End of physical flash (exclusive)
    pub const fn flash_end(&self) -> u64 {
        self.flash_base as u64 + self.flash_size as u64
    }

    /// Size of the user area in bytes
    pub const fn user_size(&self) -> u32 {
        self.user_end.saturating_sub(self.user_start)
    }

    /// Check that the constants describe a usable layout
    pub fn validate(&self) -> Result<(), MapError> {
        if self.page_size == 0 || !self.page_size.is_power_of_two() {
            return Err(MapError::InvalidPageSize);
        }
        if self.flash_size == 0 || self.flash_size % self.page_size != 0 {
            return Err(MapError::InvalidFlashSize);
        }
        if !self.is_page_aligned(self.user_start) || !self.is_page_aligned(self.user_end) {
            return Err(MapError::MisalignedUserArea);
        }
        if self.user_start > self.user_end
            || self.user_start < self.flash_base
            || self.user_end as u64 > self.flash_end()
        {
            return Err(MapError::UserAreaOutOfBounds);
        }
        if self.pages_per_wrp_bit == 0 {
            return Err(MapError::InvalidWrpGranularity);
        }
        Ok(())
    }

    /// Check if an address sits on a page boundary
    pub const fn is_page_aligned(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.flash_base) % self.page_size == 0
    }

    /// Base address of the page containing `addr`
    pub const fn page_base(&self, addr: u32) -> u32 {
        let offset = addr.wrapping_sub(self.flash_base);
        self.flash_base + offset / self.page_size * self.page_size
    }

    /// Number of pages from `start` to the end of the user area
    ///
    /// `start` must be page aligned and inside `[user_start, user_end]`.
    pub fn page_count_from(&self, start: u32) -> Result<u32, Error> {
        if !self.is_page_aligned(start) {
            return Err(Error::InvalidAlignment);
        }
        if start < self.user_start || start > self.user_end {
            return Err(Error::OutOfBounds);
        }
        Ok((self.user_end - start) / self.page_size)
    }

    /// Check if `count` words starting at `addr` lie inside the user area
    pub fn fits_words(&self, addr: u32, count: usize) -> bool {
        let end = addr as u64 + count as u64 * WORD_SIZE as u64;
        addr >= self.user_start && end <= self.user_end as u64
    }

    /// Index of the write-protection bit guarding the page at `addr`
    ///
    /// Returns `None` for addresses outside flash or beyond the 32 bits
    /// of the protection register.
    pub fn wrp_bit_for(&self, addr: u32) -> Option<u32> {
        if addr < self.flash_base || addr as u64 >= self.flash_end() {
            return None;
        }
        let page = (addr - self.flash_base) / self.page_size;
        let bit = page / self.pages_per_wrp_bit;
        (bit < 32).then_some(bit)
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::stm32f0_64k()
    }
}

impl core::fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "flash 0x{:08X}+0x{:X}, {} byte pages, user 0x{:08X}-0x{:08X}, wrp mask 0x{:08X}",
            self.flash_base,
            self.flash_size,
            self.page_size,
            self.user_start,
            self.user_end,
            self.protected_pages_mask
        )
    }
}

/// Errors that can occur when building a memory map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Page size is zero or not a power of two
    InvalidPageSize,
    /// Flash size is zero or not a whole number of pages
    InvalidFlashSize,
    /// User area bounds are not page aligned
    MisalignedUserArea,
    /// User area is inverted or extends beyond physical flash
    UserAreaOutOfBounds,
    /// Pages per write-protection bit is zero
    InvalidWrpGranularity,
    /// Failed to parse memory map file
    ParseError,
    /// I/O error
    IoError,
}

impl core::fmt::Display for MapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPageSize => write!(f, "page size must be a non-zero power of two"),
            Self::InvalidFlashSize => write!(f, "flash size must be a whole number of pages"),
            Self::MisalignedUserArea => write!(f, "user area bounds must be page aligned"),
            Self::UserAreaOutOfBounds => write!(f, "user area lies outside physical flash"),
            Self::InvalidWrpGranularity => write!(f, "pages per protection bit must be non-zero"),
            Self::ParseError => write!(f, "failed to parse memory map"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MapError {}
