// krusty_shared: shared traits and types for the delta core, the CLI, and the simulator

pub mod board_config;
pub mod config;
pub mod event;
pub mod hardware_traits;

pub use board_config::{BoardConfig, BoardRevision, BoardTiming};
pub use config::{Config, ConfigError, load_config};
pub use event::{AxisId, Event, OutputEvent, OutputQueue, StepDirection};
pub use hardware_traits::{IoLevel, IoPin, NoPin, PinAction, PinId, PinTrace, SimPin};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// --- Shared Traits and Types ---

// TimeInterface trait
pub trait TimeInterface: Send + Sync {
    fn now_monotonic(&self) -> Instant;
}

/// Wall-clock backed monotonic time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeInterface for SystemClock {
    fn now_monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to; used by the simulator and tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_ns: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ns: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, dt: Duration) {
        let ns = u64::try_from(dt.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(ns, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeInterface for ManualClock {
    fn now_monotonic(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

impl<T: TimeInterface + ?Sized> TimeInterface for &T {
    fn now_monotonic(&self) -> Instant {
        (**self).now_monotonic()
    }
}

impl<T: TimeInterface + ?Sized> TimeInterface for std::sync::Arc<T> {
    fn now_monotonic(&self) -> Instant {
        (**self).now_monotonic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_only_on_request() {
        let clock = ManualClock::new();
        let t0 = clock.now_monotonic();
        assert_eq!(clock.now_monotonic(), t0);
        clock.advance(Duration::from_micros(250));
        assert_eq!(clock.now_monotonic() - t0, Duration::from_micros(250));
        assert_eq!(clock.elapsed(), Duration::from_micros(250));
    }

    #[test]
    fn test_clock_through_shared_reference() {
        let clock = std::sync::Arc::new(ManualClock::new());
        let shared = clock.clone();
        let t0 = shared.now_monotonic();
        clock.advance(Duration::from_millis(3));
        assert_eq!(shared.now_monotonic() - t0, Duration::from_millis(3));
    }
}
