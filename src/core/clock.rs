//! Wall-clock access. Everything that depends on "now" takes a `Clock`
//! so tests can pin time.
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local wall-clock time in the given offset.
    fn local_now(&self, tz: FixedOffset) -> NaiveDateTime {
        self.now().with_timezone(&tz).naive_local()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
