//! Time source injected into the scheduler.

use std::sync::{Arc, Mutex, PoisonError};

use chime_core::Moment;
use chrono::Local;

pub trait Clock: Send + Sync {
    fn now(&self) -> Moment;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Moment {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Moment {
        (**self).now()
    }
}

/// Wall clock; quiet hours use the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Moment {
        Moment::from_zoned(&Local::now())
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Moment>>,
}

impl ManualClock {
    pub fn new(start: Moment) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move forward by `by`, keeping the time of day in step.
    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let (time_of_day, _) = now.time_of_day.overflowing_add_signed(delta);
        *now = Moment::new(now.at + delta, time_of_day);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Moment {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
