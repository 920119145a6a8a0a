// Atomic parameters - Lock-free communication control ↔ audio thread
// Uses atomic operations to share parameters between threads without locks

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe f32 parameter using atomic operations
/// Converts f32 to u32 bits for atomic storage
#[derive(Clone, Debug)]
pub struct AtomicF32 {
    inner: Arc<AtomicU32>,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Set the value (called from control thread)
    pub fn set(&self, value: f32) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Get the value (called from audio thread)
    pub fn get(&self) -> f32 {
        f32::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Output gain applied to every sound, 0.0 to 2.0
#[derive(Clone, Debug)]
pub struct MasterVolume(AtomicF32);

impl MasterVolume {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 2.0;

    pub fn new(volume: f32) -> Self {
        Self(AtomicF32::new(Self::clamp(volume)))
    }

    pub fn get(&self) -> f32 {
        self.0.get()
    }

    /// Stores the clamped value
    pub fn set(&self, volume: f32) {
        self.0.set(Self::clamp(volume));
    }

    pub fn clamp(volume: f32) -> f32 {
        if volume.is_nan() {
            return 1.0;
        }
        volume.clamp(Self::MIN, Self::MAX)
    }
}

impl Default for MasterVolume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_shared() {
        let param = AtomicF32::new(0.25);
        let reader = param.clone();
        param.set(0.75);
        assert_eq!(reader.get(), 0.75);
    }

    #[test]
    fn test_master_volume_clamped() {
        let volume = MasterVolume::default();
        assert_eq!(volume.get(), 1.0);

        volume.set(3.5);
        assert_eq!(volume.get(), 2.0);
        volume.set(-1.0);
        assert_eq!(volume.get(), 0.0);
        volume.set(f32::NAN);
        assert_eq!(volume.get(), 1.0);
    }
}
