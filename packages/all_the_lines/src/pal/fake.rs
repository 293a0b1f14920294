use std::sync::{Arc, Mutex};

use crate::pal::Clock;

/// A clock whose tick count only changes when a test says so.
///
/// Clones share the same tick count, so a test can keep one clone and advance time while the
/// collector under test holds another.
#[derive(Clone, Debug)]
pub(crate) struct FakeClock {
    ticks: Arc<Mutex<u64>>,
    unit: f64,
}

impl FakeClock {
    pub(crate) fn new(unit: f64) -> Self {
        Self {
            ticks: Arc::new(Mutex::new(0)),
            unit,
        }
    }

    pub(crate) fn advance(&self, ticks: u64) {
        *self
            .ticks
            .lock()
            .expect("FakeClock state lock should not be poisoned") += ticks;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        *self
            .ticks
            .lock()
            .expect("FakeClock state lock should not be poisoned")
    }

    fn unit(&self) -> f64 {
        self.unit
    }
}
