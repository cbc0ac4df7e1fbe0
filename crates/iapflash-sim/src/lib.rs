//! iapflash-sim - In-memory flash controller for testing
//!
//! This crate provides a simulated on-chip flash controller that
//! implements [`FlashController`] over an in-memory word array and option
//! byte image. It enforces the rules real hardware does (lock state,
//! program-only-erased-words, write protection) and can inject faults, so
//! the engine's failure paths can be exercised without a board.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
mod image;
#[cfg(test)]
mod scenarios;

#[cfg(feature = "std")]
pub use image::ImageError;

use alloc::vec;
use alloc::vec::Vec;

use iapflash_core::controller::{FlashController, FlashStatus};
use iapflash_core::error::{Error, Result};
use iapflash_core::flash::ERASED_WORD;
use iapflash_core::memory_map::{MemoryMap, WORD_SIZE};
use iapflash_core::wp::OptionBytes;

/// Faults the simulator injects into otherwise healthy operations
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    /// The unlock key sequence is rejected
    pub unlock_fails: bool,
    /// Erasing the page at this address reports a programming error
    pub fail_page_erase: Option<u32>,
    /// Programming the word at this address reports a programming error
    pub fail_program_at: Option<u32>,
    /// The word at this address is stuck erased: programming it reports
    /// success but the cell keeps reading `0xFFFF_FFFF`
    pub stuck_erased_at: Option<u32>,
    /// Option byte erase reports an error
    pub fail_option_erase: bool,
    /// Option byte program reports an error
    pub fail_option_program: bool,
    /// The controller never leaves the busy state
    pub stuck_busy: bool,
}

/// Operation recorded by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    /// Unlock key sequence
    Unlock,
    /// Lock engaged
    Lock,
    /// Page erase started
    PageErase(u32),
    /// Word program started (address, value)
    WordProgram(u32, u32),
    /// Option byte erase started
    OptionBytesErase,
    /// Option byte program started
    OptionBytesProgram(OptionBytes),
}

impl SimOp {
    /// Whether the command can change flash or option byte contents
    pub fn is_mutating(&self) -> bool {
        !matches!(self, SimOp::Unlock | SimOp::Lock)
    }
}

/// Simulated flash controller
///
/// Emulates a page-erasable, word-programmable flash array with option
/// bytes. Commands complete instantly unless [`SimFaults::stuck_busy`] is
/// set. Option byte changes take effect immediately instead of after a
/// reload.
#[derive(Debug)]
pub struct SimController {
    map: MemoryMap,
    words: Vec<u32>,
    option_bytes: OptionBytes,
    status: FlashStatus,
    locked: bool,
    faults: SimFaults,
    ops: Vec<SimOp>,
    elapsed_us: u64,
}

impl SimController {
    /// Create a new simulated controller with fully erased flash
    pub fn new(map: MemoryMap) -> Self {
        let words = vec![ERASED_WORD; (map.flash_size / WORD_SIZE) as usize];
        Self {
            map,
            words,
            option_bytes: OptionBytes::ERASED,
            status: FlashStatus::empty(),
            locked: true,
            faults: SimFaults::default(),
            ops: Vec::new(),
            elapsed_us: 0,
        }
    }

    /// Create a simulated controller with pre-filled flash contents
    ///
    /// `initial` is copied from the start of flash; a shorter slice leaves
    /// the remaining words erased.
    pub fn with_words(map: MemoryMap, initial: &[u32]) -> Self {
        let mut sim = Self::new(map);
        let len = core::cmp::min(initial.len(), sim.words.len());
        sim.words[..len].copy_from_slice(&initial[..len]);
        sim
    }

    /// Get the memory map
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Get the whole flash array
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Read one word without going through the controller interface
    ///
    /// Returns `None` for addresses outside flash or not word aligned.
    pub fn peek(&self, addr: u32) -> Option<u32> {
        self.index_of(addr).map(|i| self.words[i])
    }

    /// Overwrite one word directly, bypassing erase and protection rules
    pub fn poke(&mut self, addr: u32, value: u32) {
        if let Some(i) = self.index_of(addr) {
            self.words[i] = value;
        }
    }

    /// Option bytes currently in effect
    pub fn option_bytes(&self) -> OptionBytes {
        self.option_bytes
    }

    /// Replace the option bytes directly (provisioning a test device)
    pub fn set_option_bytes(&mut self, config: OptionBytes) {
        self.option_bytes = config;
    }

    /// Get the fault configuration
    pub fn faults_mut(&mut self) -> &mut SimFaults {
        &mut self.faults
    }

    /// Operations issued so far
    pub fn ops(&self) -> &[SimOp] {
        &self.ops
    }

    /// Forget the recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Total time spent in `delay_us`
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    fn index_of(&self, addr: u32) -> Option<usize> {
        if addr % WORD_SIZE != 0 || addr < self.map.flash_base {
            return None;
        }
        let index = ((addr - self.map.flash_base) / WORD_SIZE) as usize;
        (index < self.words.len()).then_some(index)
    }

    fn is_write_protected(&self, addr: u32) -> bool {
        match self.map.wrp_bit_for(addr) {
            Some(bit) => self.option_bytes.write_protected & (1 << bit) != 0,
            None => false,
        }
    }

    /// Record the outcome of a command that was just issued
    fn finish(&mut self, result: FlashStatus) {
        if self.faults.stuck_busy {
            self.status |= FlashStatus::BUSY;
            return;
        }
        if result.is_empty() {
            self.status |= FlashStatus::EOP;
        } else {
            self.status |= result;
        }
    }

    fn do_page_erase(&mut self, addr: u32) -> FlashStatus {
        if self.locked || !self.map.is_page_aligned(addr) {
            return FlashStatus::PGERR;
        }
        let Some(first) = self.index_of(addr) else {
            return FlashStatus::PGERR;
        };
        if self.is_write_protected(addr) {
            return FlashStatus::WRPRTERR;
        }
        if self.faults.fail_page_erase == Some(addr) {
            return FlashStatus::PGERR;
        }

        let count = (self.map.page_size / WORD_SIZE) as usize;
        let last = core::cmp::min(first + count, self.words.len());
        self.words[first..last].fill(ERASED_WORD);
        FlashStatus::empty()
    }

    fn do_word_program(&mut self, addr: u32, value: u32) -> FlashStatus {
        if self.locked {
            return FlashStatus::PGERR;
        }
        let Some(index) = self.index_of(addr) else {
            return FlashStatus::PGERR;
        };
        if self.is_write_protected(addr) {
            return FlashStatus::WRPRTERR;
        }
        if self.faults.fail_program_at == Some(addr) {
            return FlashStatus::PGERR;
        }
        // Only erased words may be programmed
        if self.words[index] != ERASED_WORD {
            return FlashStatus::PGERR;
        }
        if self.faults.stuck_erased_at != Some(addr) {
            self.words[index] = value;
        }
        FlashStatus::empty()
    }
}

impl FlashController for SimController {
    fn unlock(&mut self) -> Result<()> {
        self.ops.push(SimOp::Unlock);
        if self.faults.unlock_fails {
            return Err(Error::UnlockFailed);
        }
        self.locked = false;
        Ok(())
    }

    fn lock(&mut self) {
        self.ops.push(SimOp::Lock);
        self.locked = true;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn status(&mut self) -> FlashStatus {
        self.status
    }

    fn clear_status(&mut self, flags: FlashStatus) {
        self.status &= !(flags & FlashStatus::STICKY);
    }

    fn start_page_erase(&mut self, addr: u32) {
        self.ops.push(SimOp::PageErase(addr));
        let result = self.do_page_erase(addr);
        self.finish(result);
    }

    fn start_word_program(&mut self, addr: u32, value: u32) {
        self.ops.push(SimOp::WordProgram(addr, value));
        let result = self.do_word_program(addr, value);
        self.finish(result);
    }

    fn read_word(&mut self, addr: u32) -> u32 {
        match self.index_of(addr) {
            Some(i) => self.words[i],
            None => {
                log::warn!("Simulated read outside flash at 0x{:08X}", addr);
                0
            }
        }
    }

    fn read_option_bytes(&mut self) -> OptionBytes {
        self.option_bytes
    }

    fn start_option_bytes_erase(&mut self) {
        self.ops.push(SimOp::OptionBytesErase);
        let result = if self.locked || self.faults.fail_option_erase {
            FlashStatus::PGERR
        } else {
            self.option_bytes = OptionBytes::ERASED;
            FlashStatus::empty()
        };
        self.finish(result);
    }

    fn start_option_bytes_program(&mut self, config: &OptionBytes) {
        self.ops.push(SimOp::OptionBytesProgram(*config));
        let result = if self.locked || self.faults.fail_option_program {
            FlashStatus::PGERR
        } else if self.option_bytes != OptionBytes::ERASED {
            // Option bytes must be erased before they can be programmed
            FlashStatus::PGERR
        } else {
            self.option_bytes = *config;
            FlashStatus::empty()
        };
        self.finish(result);
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}
