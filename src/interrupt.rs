//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation token.
///
/// Workers poll it after every drained context and the saturation driver
/// before every submitted root. Setting it never corrupts state: the current
/// stage reports [`SaturationError::Interrupted`](crate::error::SaturationError)
/// and resumes from the remaining active contexts when run again.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
