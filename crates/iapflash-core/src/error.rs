//! Error types for iapflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every error is terminal for the operation that
//! raised it: the engine never retries a flash command on its own.

use core::fmt;

use crate::controller::FlashStatus;

/// Details about an erase failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseFailure {
    /// Base address of the first page that failed to erase
    pub page_addr: u32,
    /// Controller status flags observed when the page failed
    pub status: FlashStatus,
}

/// Progress of a write-with-verify request at the point it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteProgress {
    /// Number of words programmed and verified
    pub words_written: usize,
    /// Address the next word would have been programmed at
    pub next_address: u32,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Controller errors
    /// The controller stayed locked after the unlock key sequence
    UnlockFailed,
    /// A hardware operation did not complete within its time budget
    Timeout,

    // Operation errors
    /// Page erase failed
    EraseFailed(EraseFailure),
    /// Word program reported an error
    ProgramFailed(WriteProgress),
    /// Readback after programming differs from the source word
    VerifyMismatch {
        /// Progress up to (not including) the mismatching word
        progress: WriteProgress,
        /// Word that was programmed
        expected: u32,
        /// Word read back from flash
        found: u32,
    },

    // Option byte errors
    /// Option byte erase failed; option bytes were not reprogrammed
    OptionByteEraseFailed,
    /// Option byte program failed after a successful erase
    OptionByteProgramFailed,

    // Address/size errors
    /// Address or range falls outside the user flash area
    OutOfBounds,
    /// Address is not aligned to the required boundary
    InvalidAlignment,
}

impl Error {
    /// Write progress carried by the error, if the error stopped a write
    pub fn write_progress(&self) -> Option<WriteProgress> {
        match self {
            Self::ProgramFailed(progress) => Some(*progress),
            Self::VerifyMismatch { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

impl fmt::Display for EraseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "erase failed at page 0x{:08X} (status {:?})",
            self.page_addr, self.status
        )
    }
}

impl fmt::Display for WriteProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} words written, next address 0x{:08X}",
            self.words_written, self.next_address
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnlockFailed => write!(f, "flash controller did not unlock"),
            Self::Timeout => write!(f, "flash operation timed out"),
            Self::EraseFailed(failure) => write!(f, "{}", failure),
            Self::ProgramFailed(progress) => write!(f, "program failed ({})", progress),
            Self::VerifyMismatch {
                progress,
                expected,
                found,
            } => write!(
                f,
                "verify mismatch at 0x{:08X}: expected 0x{:08X}, found 0x{:08X} ({} words written)",
                progress.next_address, expected, found, progress.words_written
            ),
            Self::OptionByteEraseFailed => write!(f, "option byte erase failed"),
            Self::OptionByteProgramFailed => write!(f, "option byte program failed"),
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
