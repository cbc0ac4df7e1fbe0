//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "iapflash")]
#[command(
    author,
    version,
    about = "Rehearse in-application flash updates against a simulated device",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Memory map file (TOML format). Defaults to the STM32F0 64 KiB preset
    #[arg(long, global = true)]
    pub map: Option<PathBuf>,

    /// Flash image of the simulated device. Option bytes are kept next to it
    /// in <image>.ob.toml
    #[arg(long, global = true, default_value = "flash.bin")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the memory map in use
    Map {
        /// Print the map as a TOML file instead of a summary
        #[arg(long)]
        toml: bool,
    },

    /// Erase the user area from a page to its end
    Erase {
        /// First page to erase (hex, e.g., 0x0800F800). Defaults to the start
        /// of the user area
        #[arg(long, value_parser = parse_hex_u32)]
        start: Option<u32>,
    },

    /// Write a firmware image into the user area
    Write {
        /// Firmware image (raw binary)
        input: PathBuf,

        /// Load address (hex or decimal). Defaults to the start of the user area
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: Option<u32>,

        /// Don't erase before writing
        #[arg(long)]
        no_erase: bool,
    },

    /// Verify flash contents against a firmware image
    Verify {
        /// Firmware image (raw binary)
        input: PathBuf,

        /// Load address (hex or decimal). Defaults to the start of the user area
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: Option<u32>,
    },

    /// Write protection operations
    #[command(subcommand)]
    Wp(WpCommands),
}

/// Write protection subcommands
#[derive(Subcommand)]
pub enum WpCommands {
    /// Show which managed page groups are protected
    Status,

    /// Remove write protection from the managed page groups
    Disable,

    /// Write protect the managed page groups
    Enable,
}
