//! Injectable time source
//!
//! Proration and subscription transitions depend on "now". Reading the
//! system clock inside those calculations makes them untestable, so every
//! service takes a `Clock` and production wires in [`SystemClock`].

use std::sync::Arc;
use time::OffsetDateTime;

/// Current-time capability
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Production clock reading UTC system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a fixed instant, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Shared handle to a clock implementation
pub type SharedClock = Arc<dyn Clock>;

/// Default production clock handle
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
