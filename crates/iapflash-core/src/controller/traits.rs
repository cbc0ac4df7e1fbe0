//! Controller trait definitions
//!
//! The engine never touches registers directly. A backend (the register
//! block of a real MCU, or the simulator in `iapflash-sim`) implements
//! [`FlashController`] and is passed explicitly into every operation.

use crate::error::Result;
use crate::wp::OptionBytes;
use bitflags::bitflags;

bitflags! {
    /// Flash controller status flags
    ///
    /// Naming follows the STM32 FLASH_SR register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashStatus: u32 {
        /// An operation is in progress
        const BUSY     = 1 << 0;
        /// Programming error (target not erased, misaligned access)
        const PGERR    = 1 << 2;
        /// Write protection error (target page is write protected)
        const WRPRTERR = 1 << 4;
        /// End of operation
        const EOP      = 1 << 5;

        /// Flags that mark a failed operation
        const ERRORS = Self::PGERR.bits() | Self::WRPRTERR.bits();
        /// Sticky flags cleared before each new operation
        const STICKY = Self::EOP.bits() | Self::ERRORS.bits();
    }
}

impl Default for FlashStatus {
    fn default() -> Self {
        FlashStatus::empty()
    }
}

impl FlashStatus {
    /// Check if any error flag is set
    pub fn has_error(&self) -> bool {
        self.intersects(FlashStatus::ERRORS)
    }
}

/// On-chip flash controller
///
/// There is exactly one controller per device and its lock state and
/// status flags are global. Callers must hold exclusive access (`&mut`)
/// for the whole operation, and interrupt handlers must not touch the
/// controller while an engine operation is running.
///
/// Commands issued with the `start_*` methods return immediately; the
/// engine observes completion by polling [`status`](Self::status).
///
/// ## Example: register-backed controller
///
/// ```ignore
/// impl FlashController for Stm32Flash {
///     fn unlock(&mut self) -> Result<()> {
///         self.regs.keyr.write(|w| w.bits(KEY1));
///         self.regs.keyr.write(|w| w.bits(KEY2));
///         if self.regs.cr.read().lock().bit_is_set() {
///             return Err(Error::UnlockFailed);
///         }
///         Ok(())
///     }
///     // ...
/// }
/// ```
pub trait FlashController {
    /// Run the unlock key sequence
    ///
    /// Returns `Error::UnlockFailed` if the controller is still locked
    /// afterwards (a wrong key sequence locks it until reset).
    fn unlock(&mut self) -> Result<()>;

    /// Re-engage the controller lock
    fn lock(&mut self);

    /// Check whether the controller is locked
    fn is_locked(&self) -> bool;

    /// Read the status flags
    fn status(&mut self) -> FlashStatus;

    /// Clear the given sticky status flags
    fn clear_status(&mut self, flags: FlashStatus);

    /// Start erasing the page at `addr` (must be page aligned)
    fn start_page_erase(&mut self, addr: u32);

    /// Start programming one 32-bit word at `addr` (must be word aligned)
    fn start_word_program(&mut self, addr: u32, value: u32);

    /// Read one 32-bit word from flash
    fn read_word(&mut self, addr: u32) -> u32;

    /// Read the option bytes currently in effect
    fn read_option_bytes(&mut self) -> OptionBytes;

    /// Start erasing the whole option byte area
    fn start_option_bytes_erase(&mut self);

    /// Start programming the option byte area with `config`
    fn start_option_bytes_program(&mut self, config: &OptionBytes);

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
