use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Order Number Generation
// ============================================================================
//
// Numbers are the payment correlation key, so they must be unique and never
// reused. Each number is the wall clock in milliseconds times 1000 plus a
// per-millisecond sequence; if the clock stalls or steps back, the previous
// value + 1 is used instead.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    last: AtomicU64,
}

impl OrderNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let candidate = (chrono::Local::now().timestamp_millis().max(0) as u64) * 1000;
        self.next_after(candidate).to_string()
    }

    fn next_after(&self, candidate: u64) -> u64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}
