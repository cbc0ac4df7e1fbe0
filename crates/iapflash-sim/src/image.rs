//! File-backed simulator state
//!
//! A simulated device is persisted as two files: a raw little-endian dump
//! of the whole flash array and a TOML sidecar (`<image>.ob.toml`) holding
//! the option bytes.

use std::fs;
use std::path::{Path, PathBuf};

use iapflash_core::memory_map::{MemoryMap, WORD_SIZE};
use iapflash_core::wp::OptionBytes;
use thiserror::Error;

use crate::SimController;

/// Errors loading or saving a simulated device
#[derive(Debug, Error)]
pub enum ImageError {
    /// I/O error on the image or sidecar file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Flash dump does not match the memory map's flash size
    #[error("image is {actual} bytes, memory map expects {expected}")]
    SizeMismatch {
        /// Flash size from the memory map
        expected: u32,
        /// Size of the dump on disk
        actual: u64,
    },

    /// Option byte sidecar could not be parsed
    #[error("invalid option bytes file: {0}")]
    OptionBytesParse(#[from] toml::de::Error),

    /// Option byte sidecar could not be serialized
    #[error("cannot serialize option bytes: {0}")]
    OptionBytesSerialize(#[from] toml::ser::Error),
}

/// Path of the option byte sidecar for an image
pub fn option_bytes_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_owned();
    name.push(".ob.toml");
    PathBuf::from(name)
}

impl SimController {
    /// Load a simulated device from disk
    ///
    /// A missing image yields a fully erased device; a missing sidecar
    /// yields erased option bytes.
    pub fn load(map: MemoryMap, image: &Path) -> Result<Self, ImageError> {
        let mut sim = SimController::new(map);

        if image.exists() {
            let bytes = fs::read(image)?;
            if bytes.len() as u64 != map.flash_size as u64 {
                return Err(ImageError::SizeMismatch {
                    expected: map.flash_size,
                    actual: bytes.len() as u64,
                });
            }
            for (word, chunk) in sim
                .words
                .iter_mut()
                .zip(bytes.chunks_exact(WORD_SIZE as usize))
            {
                *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            log::debug!("Loaded flash image from {}", image.display());
        } else {
            log::info!("{} not found, starting from erased flash", image.display());
        }

        let ob_path = option_bytes_path(image);
        if ob_path.exists() {
            let content = fs::read_to_string(&ob_path)?;
            sim.option_bytes = toml::from_str::<OptionBytes>(&content)?;
            log::debug!("Loaded option bytes from {}", ob_path.display());
        }

        Ok(sim)
    }

    /// Save the flash array and option bytes to disk
    pub fn save(&self, image: &Path) -> Result<(), ImageError> {
        let bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        fs::write(image, bytes)?;

        let ob_path = option_bytes_path(image);
        fs::write(&ob_path, toml::to_string(&self.option_bytes)?)?;

        log::debug!(
            "Saved flash image to {} and option bytes to {}",
            image.display(),
            ob_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapflash_core::wp::RdpLevel;
    use tempfile::tempdir;

    #[test]
    fn test_option_bytes_path() {
        assert_eq!(
            option_bytes_path(Path::new("/tmp/dev.bin")),
            PathBuf::from("/tmp/dev.bin.ob.toml")
        );
    }

    #[test]
    fn test_missing_image_is_erased() {
        let dir = tempdir().unwrap();
        let sim = SimController::load(MemoryMap::stm32f0_64k(), &dir.path().join("none.bin")).unwrap();
        assert!(sim.words().iter().all(|&w| w == 0xFFFF_FFFF));
        assert_eq!(sim.option_bytes(), OptionBytes::ERASED);
    }

    #[test]
    fn test_save_then_load_keeps_state() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("dev.bin");
        let map = MemoryMap::stm32f0_64k();

        let mut sim = SimController::new(map);
        sim.poke(0x0800_3000, 0xDEAD_BEEF);
        sim.set_option_bytes(OptionBytes {
            write_protected: 0x0000_0007,
            rdp: RdpLevel::Level1,
            user: 0x7F,
        });
        sim.save(&image).unwrap();

        let loaded = SimController::load(map, &image).unwrap();
        assert_eq!(loaded.peek(0x0800_3000), Some(0xDEAD_BEEF));
        assert_eq!(loaded.option_bytes(), sim.option_bytes());
        assert_eq!(fs::metadata(&image).unwrap().len(), 64 * 1024);
    }

    #[test]
    fn test_wrong_size_image_rejected() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("short.bin");
        fs::write(&image, [0u8; 16]).unwrap();
        let err = SimController::load(MemoryMap::stm32f0_64k(), &image).unwrap_err();
        assert!(matches!(err, ImageError::SizeMismatch { actual: 16, .. }));
        assert!(err.to_string().contains("65536"));
    }

    #[test]
    fn test_save_writes_sidecar_next_to_image() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("dev.bin");
        SimController::new(MemoryMap::stm32f0_64k()).save(&image).unwrap();

        let sidecar = fs::read_to_string(option_bytes_path(&image)).unwrap();
        assert!(sidecar.contains("write_protected = 0"));
        // RDP kept as the raw option byte
        assert!(sidecar.contains("rdp = 170"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
