//! Flash controller abstraction
//!
//! This module contains the trait every flash controller backend
//! implements and the guard that keeps the controller unlocked for the
//! duration of a mutating operation.

mod guard;
mod traits;

pub use guard::Unlocked;
pub use traits::{FlashController, FlashStatus};
