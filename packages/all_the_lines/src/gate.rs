use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{BeginOptions, TimingCollector};

/// A reentrant enable counter in front of a [`TimingCollector`].
///
/// Any number of profiled regions may be active at the same time, whether nested on one
/// thread or overlapping across threads. The collector is activated when the first region is
/// entered and deactivated when the last one is exited, so it observes a strictly alternating
/// sequence of `begin()` and `end()` calls.
///
/// Prefer [`activate()`](Self::activate) over manual [`enter()`](Self::enter) and
/// [`exit()`](Self::exit) pairs. The returned guard exits the gate even if the region panics.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use all_the_lines::{BeginOptions, LineCollector, SessionGate};
///
/// let gate = SessionGate::new(Arc::new(LineCollector::new()), BeginOptions::new());
///
/// {
///     let _outer = gate.activate();
///     {
///         let _inner = gate.activate();
///         assert_eq!(gate.enable_count(), 2);
///     }
///     assert!(gate.is_active());
/// }
///
/// assert!(!gate.is_active());
/// ```
#[derive(Debug)]
pub struct SessionGate {
    collector: Arc<dyn TimingCollector>,
    options: BeginOptions,

    // The lock also serializes collector activation, so begin() and end() never race.
    enable_count: Mutex<usize>,
}

impl SessionGate {
    /// Creates an inactive gate that activates `collector` with `options`.
    #[must_use]
    pub fn new(collector: Arc<dyn TimingCollector>, options: BeginOptions) -> Self {
        Self {
            collector,
            options,
            enable_count: Mutex::new(0),
        }
    }

    /// Enters a profiled region, activating the collector if no other region is active.
    pub fn enter(&self) {
        let mut count = self.lock_count();

        if *count == 0 {
            tracing::trace!("activating line timing collector");
            self.collector.begin(self.options);
        }

        *count = count
            .checked_add(1)
            .expect("gate enable count overflows usize - this indicates an unrealistic scenario");
    }

    /// Exits a profiled region, deactivating the collector if it was the last active one.
    ///
    /// Exiting a gate that is not active has no effect.
    pub fn exit(&self) {
        let mut count = self.lock_count();

        if *count == 0 {
            tracing::trace!("ignoring exit of inactive gate");
            return;
        }

        *count = count.saturating_sub(1);

        if *count == 0 {
            tracing::trace!("deactivating line timing collector");
            self.collector.end();
        }
    }

    /// Enters a profiled region that lasts until the returned guard is dropped.
    pub fn activate(&self) -> GateGuard<'_> {
        self.enter();
        GateGuard { gate: self }
    }

    /// The number of profiled regions currently active.
    #[must_use]
    pub fn enable_count(&self) -> usize {
        *self.lock_count()
    }

    /// Whether the collector is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enable_count() > 0
    }

    /// The options the collector is activated with.
    #[must_use]
    pub fn options(&self) -> BeginOptions {
        self.options
    }

    // A panic while holding the lock never leaves the count half-updated.
    fn lock_count(&self) -> MutexGuard<'_, usize> {
        self.enable_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a profiled region of a [`SessionGate`] active until dropped.
#[derive(Debug)]
#[must_use = "the profiled region ends as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a SessionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.exit();
    }
}
