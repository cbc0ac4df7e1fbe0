//! Write protection support
//!
//! This module reads and toggles the write-protection option bytes that
//! guard the user flash area.
//!
//! # Overview
//!
//! Protection is stored in the option byte area next to the read
//! protection level and the user configuration bits:
//!
//! - **WRP bits**: one bit per group of pages; a protected group rejects
//!   erase and program commands
//! - **RDP**: read protection level, must survive every rewrite
//! - **USER**: watchdog/reset/boot configuration, must survive every rewrite
//!
//! Changing any of them requires erasing the whole option byte area and
//! programming the complete new image. The new values take effect after
//! the option bytes are reloaded (usually on the next reset).
//!
//! # Example
//!
//! ```ignore
//! use iapflash_core::wp::{self, DisableOutcome};
//!
//! let status = wp::protection_status(&mut ctrl, &ctx)?;
//! if !status.is_fully_unprotected() {
//!     match wp::disable_protection(&mut ctrl, &ctx)? {
//!         DisableOutcome::Disabled => request_reset(),
//!         DisableOutcome::AlreadyUnprotected => {}
//!     }
//! }
//! ```

mod ops;
mod types;

pub use ops::*;
pub use types::*;
