// src/services/busy.rs
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot in-flight marker. Not a queue: a second caller is turned away.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

pub struct BusyGuard<'a>(&'a AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.0))
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
