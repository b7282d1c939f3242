// Time Source
//
// Snapshot references and ledger timestamps are derived from the
// clock, so it is injected rather than read globally.

use chrono::{Local, NaiveDateTime};

pub trait Clock: Send + Sync {
    /// Current wall-clock time, local and naive.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Second-resolution stamp used in snapshot references.
pub fn compact_stamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}
