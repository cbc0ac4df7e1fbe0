use crate::controller::{FlashController, FlashStatus};
use crate::error::{Error, Result};

/// Wait for the BUSY flag to clear
///
/// Polls the status register until no operation is in progress, sleeping
/// `poll_delay_us` between polls. Gives up with `Error::Timeout` once
/// `timeout_us` worth of polls have been spent; the command that was in
/// flight cannot be cancelled, so the caller must treat the controller
/// state as unknown.
///
/// Returns the status observed when the controller went idle.
pub fn wait_ready<C: FlashController + ?Sized>(
    ctrl: &mut C,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<FlashStatus> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us // Fall back to polling once per microsecond
    };

    for _ in 0..max_polls.max(1) {
        let status = ctrl.status();
        if !status.contains(FlashStatus::BUSY) {
            return Ok(status);
        }
        if poll_delay_us > 0 {
            ctrl.delay_us(poll_delay_us);
        }
    }

    log::warn!("Flash controller still busy after {}us", timeout_us);
    Err(Error::Timeout)
}
