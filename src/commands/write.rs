//! Write command implementation

use iapflash_core::controller::FlashController;
use iapflash_core::flash::{self, FlashContext};
use iapflash_core::memory_map::WORD_SIZE;
use iapflash_core::Error;
use std::path::Path;

use super::erase::erase_with_progress;
use super::{create_progress_bar, read_firmware};

/// Words handed to the engine per call
///
/// Mirrors the granularity at which a bootloader receives an image from
/// its transport.
const WRITE_CHUNK_WORDS: usize = 256;

/// Run the write command
pub fn run_write<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    input: &Path,
    address: Option<u32>,
    no_erase: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let words = read_firmware(input)?;
    let start = address.unwrap_or(ctx.map.user_start);

    if !ctx.map.fits_words(start, words.len()) {
        return Err(format!(
            "Image of {} bytes at 0x{:08X} does not fit the user area 0x{:08X}-0x{:08X}",
            words.len() * WORD_SIZE as usize,
            start,
            ctx.map.user_start,
            ctx.map.user_end
        )
        .into());
    }

    if !no_erase {
        erase_with_progress(ctrl, ctx, ctx.map.page_base(start))?;
    }

    let written = write_with_progress(ctrl, ctx, start, &words)?;
    println!(
        "Wrote and verified {} words ({} bytes) at 0x{:08X}",
        written,
        written * WORD_SIZE as usize,
        start
    );

    Ok(())
}

/// Write `words` in chunks, advancing a progress bar per chunk
fn write_with_progress<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    start: u32,
    words: &[u32],
) -> Result<usize, Box<dyn std::error::Error>> {
    let total_bytes = (words.len() * WORD_SIZE as usize) as u64;
    let pb = create_progress_bar(total_bytes, "Writing");

    let mut address = start;
    let mut written = 0;
    for chunk in words.chunks(WRITE_CHUNK_WORDS) {
        match flash::write_verify(ctrl, ctx, &mut address, chunk) {
            Ok(n) => {
                written += n;
                pb.set_position((written * WORD_SIZE as usize) as u64);
            }
            Err(e) => {
                pb.abandon_with_message("Write failed");
                report_partial_write(&e, written, start);
                return Err(e.into());
            }
        }
    }

    pb.finish_with_message("Write complete");
    Ok(written)
}

fn report_partial_write(error: &Error, earlier_words: usize, start: u32) {
    let Some(progress) = error.write_progress() else {
        return;
    };
    let total = earlier_words + progress.words_written;
    eprintln!(
        "{} words verified from 0x{:08X}; flash from 0x{:08X} is in an unknown state",
        total, start, progress.next_address
    );
}
