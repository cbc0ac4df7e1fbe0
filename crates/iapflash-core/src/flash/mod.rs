//! Flash programming operations

mod context;
mod operations;
mod wait;

pub use context::{FlashContext, Timeouts};
pub use operations::*;
pub use wait::wait_ready;
