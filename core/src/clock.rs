//! Time source for the guard's "is it today?" check.

use chrono::{DateTime, Local, NaiveDate};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Calendar day of [`Clock::now`] in the local time zone.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}
