//! TOML memory map parsing
//!
//! Parses board memory maps in TOML format:
//!
//! ```toml
//! [memory]
//! flash_base = "0x08000000"
//! flash_size = "64 KiB"
//! page_size = "1 KiB"
//! user_start = 0x08003000
//! user_end = 0x08010000
//! pages_per_wrp_bit = 4
//! protected_pages_mask = "0x0000FFF8"
//! ```

use std::fs;
use std::path::Path;
use std::string::String;
use std::format;

use super::{MapError, MemoryMap};

/// TOML memory map file structure
#[derive(Debug, serde::Deserialize)]
struct TomlMapFile {
    memory: TomlMemory,
}

/// `[memory]` table
#[derive(Debug, serde::Deserialize)]
struct TomlMemory {
    #[serde(deserialize_with = "deserialize_size")]
    flash_base: u32,
    #[serde(deserialize_with = "deserialize_size")]
    flash_size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    page_size: u32,
    #[serde(deserialize_with = "deserialize_size")]
    user_start: u32,
    #[serde(deserialize_with = "deserialize_size")]
    user_end: u32,
    #[serde(default = "default_pages_per_wrp_bit")]
    pages_per_wrp_bit: u32,
    #[serde(deserialize_with = "deserialize_size")]
    protected_pages_mask: u32,
}

fn default_pages_per_wrp_bit() -> u32 {
    1
}

/// Deserialize a u32 given as an integer, hex string or size string
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...), decimal, or carry a size suffix
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(&hex.replace('_', ""), 16)
            .map_err(|e| format!("invalid hex: {}", e));
    }

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl MemoryMap {
    /// Load and validate a memory map from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let content = fs::read_to_string(path).map_err(|_| MapError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a memory map from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, MapError> {
        let file: TomlMapFile = toml::from_str(content).map_err(|e| {
            log::debug!("Memory map parse error: {}", e);
            MapError::ParseError
        })?;
        let m = file.memory;

        let map = MemoryMap {
            flash_base: m.flash_base,
            flash_size: m.flash_size,
            page_size: m.page_size,
            user_start: m.user_start,
            user_end: m.user_end,
            pages_per_wrp_bit: m.pages_per_wrp_bit,
            protected_pages_mask: m.protected_pages_mask,
        };
        map.validate()?;
        Ok(map)
    }

    /// Convert the memory map to a TOML string
    pub fn to_toml_string(&self) -> String {
        format!(
            "[memory]\n\
             flash_base = \"0x{:08X}\"\n\
             flash_size = \"{}\"\n\
             page_size = \"{}\"\n\
             user_start = \"0x{:08X}\"\n\
             user_end = \"0x{:08X}\"\n\
             pages_per_wrp_bit = {}\n\
             protected_pages_mask = \"0x{:08X}\"\n",
            self.flash_base,
            format_size(self.flash_size),
            format_size(self.page_size),
            self.user_start,
            self.user_end,
            self.pages_per_wrp_bit,
            self.protected_pages_mask,
        )
    }
}

/// Format a size as human-readable string
fn format_size(size: u32) -> String {
    if size >= 1024 * 1024 && size % (1024 * 1024) == 0 {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 && size % 1024 == 0 {
        format!("{} KiB", size / 1024)
    } else {
        format!("{}", size)
    }
}
