use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide processed/error counters, shared through `Arc`.
#[derive(Debug, Default)]
pub struct ProcessingCounters {
    processed: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub errors: u64,
}

impl ProcessingCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new value.
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new value.
    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed(),
            errors: self.errors(),
        }
    }
}
