//! Erase and write-with-verify operations
//!
//! Every mutating operation runs under a single [`Unlocked`] guard and
//! stops at the first failure. Nothing is retried: a page or word that
//! failed is left as the hardware left it and the caller decides whether
//! to restart the whole update.

use crate::controller::{FlashController, FlashStatus, Unlocked};
use crate::error::{EraseFailure, Error, Result, WriteProgress};
use crate::memory_map::WORD_SIZE;

use super::context::FlashContext;
use super::wait::wait_ready;

/// The erased value of a flash word (all bits set)
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Normalize the controller state at boot
///
/// Unlocks the controller, clears stale status flags and locks it again.
pub fn init<C: FlashController + ?Sized>(ctrl: &mut C) -> Result<()> {
    let _flash = Unlocked::new(ctrl)?;
    log::debug!("Flash controller initialized");
    Ok(())
}

/// Erase every page from `start` to the end of the user area
///
/// `start` must be page aligned and lie inside the user area; `user_end`
/// itself is accepted and erases nothing. Returns the number of pages
/// erased.
///
/// On failure the error carries the base address of the first page that
/// did not erase. Pages before it are erased, pages after it untouched.
pub fn erase<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    start: u32,
) -> Result<u32> {
    let page_count = ctx.map.page_count_from(start).inspect_err(|e| {
        log::warn!("Refusing to erase from 0x{:08X}: {}", start, e);
    })?;

    log::debug!(
        "Erasing {} pages at 0x{:08X}-0x{:08X}",
        page_count,
        start,
        ctx.map.user_end
    );

    let mut flash = Unlocked::new(ctrl)?;
    for page in 0..page_count {
        let page_addr = start + page * ctx.map.page_size;
        erase_page(&mut *flash, ctx, page_addr)?;
    }

    Ok(page_count)
}

fn erase_page<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    page_addr: u32,
) -> Result<()> {
    log::trace!("Erasing page 0x{:08X}", page_addr);

    ctrl.clear_status(FlashStatus::STICKY);
    ctrl.start_page_erase(page_addr);
    let status = wait_ready(ctrl, ctx.timeouts.poll_delay_us, ctx.timeouts.page_erase_us)?;

    if status.has_error() {
        log::warn!("Page erase at 0x{:08X} failed: {:?}", page_addr, status);
        return Err(Error::EraseFailed(EraseFailure { page_addr, status }));
    }

    Ok(())
}

/// Program `words` starting at `*address`, verifying each word
///
/// Words are programmed strictly in order; each one is read back and
/// compared before the next is issued. `*address` advances by one word for
/// every verified word, so on return it points just past the last good
/// word whether the call succeeded or not. Chunked images can be written by
/// calling this repeatedly with the same cursor.
///
/// The whole request must fit in the user area, otherwise
/// `Error::OutOfBounds` is returned before anything is programmed.
///
/// Returns the number of words written.
pub fn write_verify<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    address: &mut u32,
    words: &[u32],
) -> Result<usize> {
    if *address % WORD_SIZE != 0 {
        log::warn!("Write address 0x{:08X} is not word aligned", *address);
        return Err(Error::InvalidAlignment);
    }
    if !ctx.map.fits_words(*address, words.len()) {
        log::warn!(
            "Write of {} words at 0x{:08X} crosses the user area 0x{:08X}-0x{:08X}",
            words.len(),
            *address,
            ctx.map.user_start,
            ctx.map.user_end
        );
        return Err(Error::OutOfBounds);
    }

    log::debug!("Writing {} words at 0x{:08X}", words.len(), *address);

    let mut flash = Unlocked::new(ctrl)?;
    for (index, &word) in words.iter().enumerate() {
        let progress = WriteProgress {
            words_written: index,
            next_address: *address,
        };

        flash.clear_status(FlashStatus::STICKY);
        flash.start_word_program(*address, word);
        let status = wait_ready(
            &mut *flash,
            ctx.timeouts.poll_delay_us,
            ctx.timeouts.word_program_us,
        )?;

        if status.has_error() {
            log::warn!("Program at 0x{:08X} failed: {:?}", *address, status);
            return Err(Error::ProgramFailed(progress));
        }

        let found = flash.read_word(*address);
        if found != word {
            log::warn!(
                "Verify at 0x{:08X} failed: wrote 0x{:08X}, read 0x{:08X}",
                *address,
                word,
                found
            );
            return Err(Error::VerifyMismatch {
                progress,
                expected: word,
                found,
            });
        }

        log::trace!("0x{:08X} <- 0x{:08X}", *address, word);
        *address += WORD_SIZE;
    }

    Ok(words.len())
}

/// Read words from flash into `buf`
///
/// Reads need no unlock; the range only has to lie inside physical flash.
pub fn read_words<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    address: u32,
    buf: &mut [u32],
) -> Result<()> {
    if address % WORD_SIZE != 0 {
        return Err(Error::InvalidAlignment);
    }
    if !ctx.is_valid_range(address, buf.len() * WORD_SIZE as usize) {
        return Err(Error::OutOfBounds);
    }

    for (i, word) in buf.iter_mut().enumerate() {
        *word = ctrl.read_word(address + i as u32 * WORD_SIZE);
    }

    Ok(())
}

/// Check whether `len` bytes starting at `address` read as erased
pub fn is_erased<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    address: u32,
    len: u32,
) -> Result<bool> {
    if address % WORD_SIZE != 0 || len % WORD_SIZE != 0 {
        return Err(Error::InvalidAlignment);
    }
    if !ctx.is_valid_range(address, len as usize) {
        return Err(Error::OutOfBounds);
    }

    let erased = (address..address + len)
        .step_by(WORD_SIZE as usize)
        .all(|addr| ctrl.read_word(addr) == ERASED_WORD);

    Ok(erased)
}
