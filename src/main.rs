//! iapflash - Rehearse in-application flash updates
//!
//! Drives the `iapflash-core` programming engine against a simulated
//! on-chip flash controller whose contents persist in a device image.
//!
//! # Device image
//!
//! The simulated device lives in two files: a raw dump of the whole flash
//! array (`--image`, default `flash.bin`) and its option bytes in
//! `<image>.ob.toml`. A missing image is a factory-fresh, fully erased
//! device. Every mutating command saves the device back, including when
//! it fails, so the state a failed update leaves behind can be inspected.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, WpCommands};
use iapflash_core::flash::{self, FlashContext};
use iapflash_core::memory_map::MemoryMap;
use iapflash_sim::SimController;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still overrides the level picked from -v
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(cli.verbose).as_str()),
    )
    .init();

    let map = load_memory_map(cli.map.as_deref())?;
    let ctx = FlashContext::new(map)?;

    if let Commands::Map { toml } = cli.command {
        print_memory_map(&map, toml);
        return Ok(());
    }

    let mut sim = SimController::load(map, &cli.image)?;
    flash::init(&mut sim)?;

    let result = match cli.command {
        Commands::Map { .. } => Ok(()),
        Commands::Erase { start } => commands::run_erase(&mut sim, &ctx, start),
        Commands::Write {
            input,
            address,
            no_erase,
        } => commands::run_write(&mut sim, &ctx, &input, address, no_erase),
        Commands::Verify { input, address } => {
            commands::run_verify(&mut sim, &ctx, &input, address)
        }
        Commands::Wp(subcmd) => match subcmd {
            WpCommands::Status => commands::wp::cmd_status(&mut sim, &ctx),
            WpCommands::Disable => commands::wp::cmd_disable(&mut sim, &ctx),
            WpCommands::Enable => commands::wp::cmd_enable(&mut sim, &ctx),
        },
    };

    if sim.ops().iter().any(|op| op.is_mutating()) {
        sim.save(&cli.image)?;
        log::info!("Saved device image to {}", cli.image.display());
    }

    result
}

/// Default log level for a `-v` count
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Load the memory map from a file or fall back to the preset
fn load_memory_map(path: Option<&Path>) -> Result<MemoryMap, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let map = MemoryMap::from_toml_file(p)
                .map_err(|e| format!("Failed to load memory map {}: {}", p.display(), e))?;
            log::debug!("Loaded memory map from {}", p.display());
            Ok(map)
        }
        None => Ok(MemoryMap::stm32f0_64k()),
    }
}

/// Print the memory map
fn print_memory_map(map: &MemoryMap, as_toml: bool) {
    if as_toml {
        print!("{}", map.to_toml_string());
        return;
    }

    println!(
        "Flash:      0x{:08X}-0x{:08X} ({} KiB)",
        map.flash_base,
        map.flash_end(),
        map.flash_size / 1024
    );
    println!(
        "Page size:  {} bytes ({} pages)",
        map.page_size,
        map.flash_size / map.page_size
    );
    println!(
        "User area:  0x{:08X}-0x{:08X} ({} bytes)",
        map.user_start,
        map.user_end,
        map.user_size()
    );
    println!(
        "Protection: {} pages per bit, managed groups 0x{:08X}",
        map.pages_per_wrp_bit, map.protected_pages_mask
    );
}
