//! Erase command implementation

use iapflash_core::controller::FlashController;
use iapflash_core::flash::{self, FlashContext};

use super::create_spinner;

/// Run the erase command
pub fn run_erase<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    start: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = start.unwrap_or(ctx.map.user_start);
    erase_with_progress(ctrl, ctx, start)?;
    Ok(())
}

/// Erase from `start` to the end of the user area behind a spinner
///
/// Returns the number of pages erased.
pub(super) fn erase_with_progress<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    start: u32,
) -> Result<u32, Box<dyn std::error::Error>> {
    let pb = create_spinner(format!(
        "Erasing 0x{:08X}-0x{:08X}...",
        start, ctx.map.user_end
    ));

    match flash::erase(ctrl, ctx, start) {
        Ok(pages) => {
            pb.finish_with_message(format!(
                "Erased {} pages ({} bytes)",
                pages,
                pages * ctx.page_size()
            ));
            Ok(pages)
        }
        Err(e) => {
            pb.abandon_with_message("Erase failed");
            Err(e.into())
        }
    }
}
