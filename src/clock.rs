use std::sync::Arc;
use std::time::Instant;

/// Time source for the guard registry
///
/// Loops are measured on a monotonic clock, so wall-clock adjustments on the
/// host never trip (or hide) a guard.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Default clock backed by `Instant::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
