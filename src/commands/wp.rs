//! Write protection command implementations

use iapflash_core::controller::FlashController;
use iapflash_core::flash::FlashContext;
use iapflash_core::memory_map::MemoryMap;
use iapflash_core::wp::{self, DisableOutcome, EnableOutcome};
use std::error::Error;

/// Address range guarded by one protection bit, clamped to physical flash
fn group_range(map: &MemoryMap, bit: u32) -> (u32, u64) {
    let group_size = map.pages_per_wrp_bit as u64 * map.page_size as u64;
    let start = map.flash_base as u64 + bit as u64 * group_size;
    let end = (start + group_size).min(map.flash_end());
    (start as u32, end)
}

/// Show the protection state of every managed page group
pub fn cmd_status<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<(), Box<dyn Error>> {
    let config = wp::read_option_bytes(ctrl)?;
    let status = wp::protection_status(ctrl, ctx)?;

    println!("Write protection: {}", status);
    println!("Read protection: {} (0x{:02X})", config.rdp, config.rdp.to_byte());
    println!("Option bytes: wrp=0x{:08X} user=0x{:02X}", config.write_protected, config.user);

    for bit in (0..32).filter(|b| status.mask() & (1 << b) != 0) {
        let (start, end) = group_range(&ctx.map, bit);
        if start as u64 >= ctx.map.flash_end() {
            continue;
        }
        let state = if status.bits() & (1 << bit) != 0 {
            "unprotected"
        } else {
            "protected"
        };
        println!("    group {:2}  0x{:08X}-0x{:08X}  {}", bit, start, end, state);
    }

    Ok(())
}

/// Remove write protection from the managed page groups
pub fn cmd_disable<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<(), Box<dyn Error>> {
    match wp::disable_protection(ctrl, ctx)? {
        DisableOutcome::Disabled => println!("Write protection disabled."),
        DisableOutcome::AlreadyUnprotected => println!("Write protection already disabled."),
    }
    Ok(())
}

/// Write protect the managed page groups
pub fn cmd_enable<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
) -> Result<(), Box<dyn Error>> {
    match wp::enable_protection(ctrl, ctx)? {
        EnableOutcome::Enabled => println!("Write protection enabled."),
        EnableOutcome::AlreadyProtected => println!("Write protection already enabled."),
    }
    Ok(())
}
