//! Monotonic time sources.
//!
//! Controllers never read the wall clock directly. They hold a [`SharedClock`]
//! so that tests and faster-than-real-time simulations can drive them with a
//! [`ManualClock`], while the running service uses [`SystemClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source.
///
/// `now` returns the time elapsed since an arbitrary, fixed origin. Only
/// differences between two readings are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Clock handle shared between the engine, the PID and the autotuner.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by [`Instant`], measured from its construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Convenience constructor for a shared handle.
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `dt`.
    pub fn advance(&self, dt: Duration) {
        self.nanos.fetch_add(duration_to_nanos(dt), Ordering::SeqCst);
    }

    /// Move time forward by `seconds`. Negative or non-finite values are ignored.
    pub fn advance_secs(&self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.advance(Duration::from_secs_f64(seconds));
        }
    }

    /// Jump to an absolute reading. Going backwards is not prevented; callers
    /// that rely on monotonicity must not do it.
    pub fn set(&self, t: Duration) {
        self.nanos.store(duration_to_nanos(t), Ordering::SeqCst);
    }

    /// Shared handle over the same time base.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.shared();

        clock.advance(Duration::from_millis(1500));
        assert_eq!(handle.now(), Duration::from_millis(1500));

        clock.advance_secs(0.5);
        assert_eq!(handle.now(), Duration::from_secs(2));

        clock.advance_secs(-4.0);
        assert_eq!(handle.now(), Duration::from_secs(2));
    }

    #[test]
    fn manual_clock_set_absolute() {
        let clock = ManualClock::new();
        clock.set(Duration::from_secs(42));
        assert_eq!(clock.now(), Duration::from_secs(42));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
