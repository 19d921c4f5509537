//! Daily schedule arithmetic for the menu refresh.

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

// Next `hour:00:00` at or after `now`.
pub fn next_run(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let at = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date().and_time(at);
    if today < now {
        today + TimeDelta::days(1)
    } else {
        today
    }
}

pub fn delay_until_next(now: NaiveDateTime, hour: u32) -> Duration {
    (next_run(now, hour) - now).to_std().unwrap_or(Duration::ZERO)
}
