//! Wall-clock sources

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// System time source consumed by the clock and the record store.
pub trait WallClock: Send + Sync + 'static {
    fn wall_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that only moves when told to. Used for replay and tests.
#[derive(Debug)]
pub struct ManualWallClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualWallClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl WallClock for ManualWallClock {
    fn wall_now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
