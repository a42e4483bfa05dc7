//! Lock-free cells shared between the control thread and the audio callback

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Last-value slot written by the control thread, consumed once per tick by
/// the audio thread.
///
/// Only the most recent value survives; earlier unread writes are dropped.
#[derive(Debug, Default)]
pub struct PendingValue {
    bits: AtomicU64,
    dirty: AtomicBool,
}

impl PendingValue {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Publish a new value (control thread)
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Consume the pending value, if any (audio thread)
    pub fn take(&self) -> Option<f64> {
        if self.dirty.swap(false, Ordering::Acquire) {
            Some(f64::from_bits(self.bits.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

/// `f64` published through its bit pattern
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_consumes_once() {
        let slot = PendingValue::new();
        assert_eq!(slot.take(), None);

        slot.store(1.5);
        assert!(slot.is_pending());
        assert_eq!(slot.take(), Some(1.5));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let slot = PendingValue::new();
        slot.store(0.5);
        slot.store(2.0);
        assert_eq!(slot.take(), Some(2.0));
    }

    #[test]
    fn test_value_crosses_threads() {
        let slot = Arc::new(PendingValue::new());
        let writer = Arc::clone(&slot);
        thread::spawn(move || writer.store(-3.25))
            .join()
            .unwrap();
        assert_eq!(slot.take(), Some(-3.25));
    }

    #[test]
    fn test_atomic_f64_roundtrip() {
        let value = AtomicF64::new(1.0);
        value.store(123.456);
        assert_eq!(value.load(), 123.456);
    }
}
