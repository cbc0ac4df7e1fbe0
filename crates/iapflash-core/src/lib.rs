//! iapflash-core - Flash programming engine for in-application programmers
//!
//! This crate erases, programs and verifies the user area of a
//! microcontroller's on-chip flash and manages the write-protection option
//! bytes guarding it. It is `no_std` so the same code runs inside the
//! bootloader and in host-side tests against a simulated controller.
//!
//! # Features
//!
//! - `std` - Enable standard library support and TOML memory map loading
//!
//! # Example
//!
//! ```ignore
//! use iapflash_core::controller::FlashController;
//! use iapflash_core::flash::{self, FlashContext};
//!
//! fn update<C: FlashController>(
//!     ctrl: &mut C,
//!     ctx: &FlashContext,
//!     image: &[u32],
//! ) -> iapflash_core::Result<()> {
//!     flash::init(ctrl)?;
//!     flash::erase(ctrl, ctx, ctx.map.user_start)?;
//!     let mut address = ctx.map.user_start;
//!     flash::write_verify(ctrl, ctx, &mut address, image)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod controller;
pub mod error;
pub mod flash;
pub mod memory_map;
pub mod wp;

pub use error::{Error, Result};
