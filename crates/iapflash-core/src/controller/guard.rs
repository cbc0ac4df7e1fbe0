use core::ops::{Deref, DerefMut};

use super::traits::{FlashController, FlashStatus};
use crate::error::Result;

/// Unlocked flash controller
///
/// Created by [`Unlocked::new`], which runs the unlock sequence and clears
/// stale status flags. The controller is locked again when the guard is
/// dropped, on every exit path.
pub struct Unlocked<'a, C: FlashController + ?Sized> {
    ctrl: &'a mut C,
}

impl<'a, C: FlashController + ?Sized> Unlocked<'a, C> {
    /// Unlock the controller and clear its sticky status flags
    pub fn new(ctrl: &'a mut C) -> Result<Self> {
        if let Err(e) = ctrl.unlock() {
            log::warn!("Flash unlock failed: {}", e);
            ctrl.lock();
            return Err(e);
        }
        ctrl.clear_status(FlashStatus::STICKY);
        log::trace!("Flash controller unlocked");

        Ok(Self { ctrl })
    }
}

impl<C: FlashController + ?Sized> Drop for Unlocked<'_, C> {
    fn drop(&mut self) {
        self.ctrl.lock();
        log::trace!("Flash controller locked");
    }
}

impl<C: FlashController + ?Sized> Deref for Unlocked<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctrl
    }
}

impl<C: FlashController + ?Sized> DerefMut for Unlocked<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctrl
    }
}
