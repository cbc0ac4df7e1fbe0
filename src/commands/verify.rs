//! Verify command implementation

use iapflash_core::controller::FlashController;
use iapflash_core::flash::{self, FlashContext};
use iapflash_core::memory_map::WORD_SIZE;
use std::path::Path;

use super::{create_progress_bar, read_firmware};

/// Words read back per step
const VERIFY_CHUNK_WORDS: usize = 1024;

/// Run the verify command
pub fn run_verify<C: FlashController + ?Sized>(
    ctrl: &mut C,
    ctx: &FlashContext,
    input: &Path,
    address: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = read_firmware(input)?;
    let start = address.unwrap_or(ctx.map.user_start);

    let pb = create_progress_bar((expected.len() * WORD_SIZE as usize) as u64, "Verifying");
    let mut buf = vec![0u32; VERIFY_CHUNK_WORDS];

    for (i, chunk) in expected.chunks(VERIFY_CHUNK_WORDS).enumerate() {
        let chunk_addr = start + (i * VERIFY_CHUNK_WORDS) as u32 * WORD_SIZE;
        let actual = &mut buf[..chunk.len()];
        flash::read_words(ctrl, ctx, chunk_addr, actual)?;

        if let Some(offset) = actual.iter().zip(chunk).position(|(a, e)| a != e) {
            pb.abandon_with_message("Verification failed");
            let addr = chunk_addr + offset as u32 * WORD_SIZE;
            return Err(format!(
                "Mismatch at 0x{:08X}: expected 0x{:08X}, found 0x{:08X}",
                addr, chunk[offset], actual[offset]
            )
            .into());
        }

        pb.inc((chunk.len() * WORD_SIZE as usize) as u64);
    }

    pb.finish_with_message("Verification passed");
    Ok(())
}
