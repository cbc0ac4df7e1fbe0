//! CLI command implementations
//!
//! Every command drives the engine in `iapflash-core` against the
//! simulated controller loaded from the device image, exactly as the
//! bootloader drives the real controller.

mod erase;
mod verify;
mod write;
pub mod wp;

pub use erase::run_erase;
pub use verify::run_verify;
pub use write::run_write;

use iapflash_core::memory_map::WORD_SIZE;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Read a firmware image as little-endian words
///
/// A trailing partial word is padded with the erased value (0xFF bytes).
fn read_firmware(path: &Path) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    if data.is_empty() {
        return Err(format!("{} is empty", path.display()).into());
    }
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(bytes_to_words(&data))
}

fn bytes_to_words(data: &[u8]) -> Vec<u32> {
    data.chunks(WORD_SIZE as usize)
        .map(|chunk| {
            let mut word = [0xFF; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .collect()
}

/// Create a progress bar counting bytes, labelled with a phase
fn create_progress_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create a spinner for operations without intermediate progress
fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
