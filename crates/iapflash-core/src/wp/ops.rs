//! Write protection operations
//!
//! This module reads the write-protection option bytes and rewrites them
//! to toggle protection on the page groups named by the memory map's
//! `protected_pages_mask`.

use super::types::{DisableOutcome, EnableOutcome, OptionBytes, ProtectionStatus};
use crate::controller::{FlashController, FlashStatus, Unlocked};
use crate::error::{Error, Result};
use crate::flash::{wait_ready, FlashContext};

/// Read the option bytes currently in effect
///
/// The controller is unlocked around the read even though reading does
/// not need it, so the controller is never left in an unexpected state.
pub fn read_option_bytes<C: FlashController + ?Sized>(ctrl: &mut C) -> Result<OptionBytes> {
    let mut flash = Unlocked::new(ctrl)?;
    Ok(flash.read_option_bytes())
}

/// Report which managed page groups are *not* write protected
///
/// The returned bitmask has a bit set for every page group in
/// `protected_pages_mask` that is currently **unprotected**. A result equal
/// to the mask means nothing the engine manages is protected.
pub fn protection_status<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<ProtectionStatus> {
    let config = read_option_bytes(ctrl)?;
    let status =
        ProtectionStatus::from_write_protected(config.write_protected, ctx.map.protected_pages_mask);
    log::debug!("Write protection status: {}", status);
    Ok(status)
}

/// Remove write protection from the managed page groups
///
/// Protection on page groups outside the mask, the read protection level
/// and the user configuration bits are carried over unchanged. Returns
/// `DisableOutcome::AlreadyUnprotected` without touching the option bytes
/// when no managed group is protected.
///
/// If the option byte erase succeeds but the program step fails, the device
/// is left with erased option bytes (no protection, read protection level 0)
/// until they are programmed again.
pub fn disable_protection<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<DisableOutcome> {
    let mask = ctx.map.protected_pages_mask;
    let mut flash = Unlocked::new(ctrl)?;

    let old = flash.read_option_bytes();
    if ProtectionStatus::from_write_protected(old.write_protected, mask).is_fully_unprotected() {
        log::info!("Write protection already disabled");
        return Ok(DisableOutcome::AlreadyUnprotected);
    }

    let new = old.with_write_protected(old.write_protected & !mask);
    rewrite_option_bytes(&mut *flash, ctx, &new)?;

    log::info!(
        "Write protection disabled (0x{:08X} -> 0x{:08X})",
        old.write_protected,
        new.write_protected
    );
    Ok(DisableOutcome::Disabled)
}

/// Write protect the managed page groups
///
/// The inverse of [`disable_protection`]: foreign protection bits, the read
/// protection level and the user configuration bits are preserved.
pub fn enable_protection<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<EnableOutcome> {
    let mask = ctx.map.protected_pages_mask;
    let mut flash = Unlocked::new(ctrl)?;

    let old = flash.read_option_bytes();
    if ProtectionStatus::from_write_protected(old.write_protected, mask).is_fully_protected() {
        log::info!("Write protection already enabled");
        return Ok(EnableOutcome::AlreadyProtected);
    }

    let new = old.with_write_protected(old.write_protected | mask);
    rewrite_option_bytes(&mut *flash, ctx, &new)?;

    log::info!(
        "Write protection enabled (0x{:08X} -> 0x{:08X})",
        old.write_protected,
        new.write_protected
    );
    Ok(EnableOutcome::Enabled)
}

/// Erase the option byte area, then program the complete new image
///
/// The program step is only attempted after a confirmed erase.
fn rewrite_option_bytes<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    config: &OptionBytes,
) -> Result<()> {
    let budget = ctx.timeouts.option_bytes_us;
    let poll = ctx.timeouts.poll_delay_us;

    ctrl.clear_status(FlashStatus::STICKY);
    ctrl.start_option_bytes_erase();
    let status = wait_ready(ctrl, poll, budget)?;
    if status.has_error() {
        log::warn!("Option byte erase failed: {:?}", status);
        return Err(Error::OptionByteEraseFailed);
    }

    ctrl.clear_status(FlashStatus::STICKY);
    ctrl.start_option_bytes_program(config);
    let status = wait_ready(ctrl, poll, budget)?;
    if status.has_error() {
        log::warn!(
            "Option byte program failed: {:?}, option bytes left erased",
            status
        );
        return Err(Error::OptionByteProgramFailed);
    }

    Ok(())
}
