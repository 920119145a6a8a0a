// Wake lock - Keeps the host awake while clicks are playing
// A lease releases its lock when dropped

use std::fmt;

/// Held keep-awake request; dropping it releases the lock
pub struct WakeLease {
    release: Option<Box<dyn FnOnce()>>,
}

impl WakeLease {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Lease with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for WakeLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for WakeLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeLease")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Platform keep-awake service
pub trait WakeLock {
    /// `None` when the platform refused or has no such service
    fn acquire(&mut self) -> Option<WakeLease>;
}

/// For hosts without a keep-awake service
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&mut self) -> Option<WakeLease> {
        None
    }
}
