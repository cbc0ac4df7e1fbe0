//! Flash context - constants and time budgets for flash operations

use crate::memory_map::{MapError, MemoryMap};

/// Time budgets for hardware operations, in microseconds
///
/// Defaults are generous upper bounds for STM32F0-class parts
/// (page erase typically 20-40ms, word program 40-60us).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Delay between status polls
    pub poll_delay_us: u32,
    /// Budget for erasing one page
    pub page_erase_us: u32,
    /// Budget for programming one word
    pub word_program_us: u32,
    /// Budget for an option byte erase or program
    pub option_bytes_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_delay_us: 10,
            page_erase_us: 40_000,
            word_program_us: 1_000,
            option_bytes_us: 100_000,
        }
    }
}

/// Runtime context for flash operations
///
/// Holds the validated memory map and the time budgets used while
/// waiting for the controller.
#[derive(Debug, Clone, Copy)]
pub struct FlashContext {
    /// Memory map of the device
    pub map: MemoryMap,
    /// Hardware time budgets
    pub timeouts: Timeouts,
}

impl FlashContext {
    /// Create a new flash context with default time budgets
    pub fn new(map: MemoryMap) -> Result<Self, MapError> {
        Self::with_timeouts(map, Timeouts::default())
    }

    /// Create a new flash context with explicit time budgets
    pub fn with_timeouts(map: MemoryMap, timeouts: Timeouts) -> Result<Self, MapError> {
        map.validate()?;
        Ok(Self { map, timeouts })
    }

    /// Get the page size
    pub fn page_size(&self) -> u32 {
        self.map.page_size
    }

    /// Check if a word-aligned range lies inside physical flash
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        let end = addr as u64 + len as u64;
        addr >= self.map.flash_base && end <= self.map.flash_end()
    }
}
