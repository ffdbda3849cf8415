//! Working-hours grid shared by booking validation and availability.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Length of every appointment slot, in minutes.
pub const SLOT_MINUTES: i64 = 60;

/// First hour of the working day (inclusive).
pub const WORK_START_HOUR: i64 = 9;

/// Hour the working day ends; a slot must finish no later than this.
pub const WORK_END_HOUR: i64 = 21;

pub fn slot_duration() -> Duration {
    Duration::minutes(SLOT_MINUTES)
}

pub fn slot_end(start: NaiveDateTime) -> NaiveDateTime {
    start + slot_duration()
}

/// `[day@09:00, day@21:00)` for the given calendar day.
pub fn working_day(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let midnight = day.and_time(NaiveTime::default());
    (
        midnight + Duration::hours(WORK_START_HOUR),
        midnight + Duration::hours(WORK_END_HOUR),
    )
}

pub fn is_within_working_hours(start: NaiveDateTime) -> bool {
    let (day_start, day_end) = working_day(start.date());
    start >= day_start && slot_end(start) <= day_end
}

pub fn is_slot_aligned(start: NaiveDateTime) -> bool {
    start.minute() == 0 && start.second() == 0 && start.nanosecond() == 0
}

/// Half-open interval overlap of two slots starting at `a` and `b`.
pub fn slots_overlap(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a < slot_end(b) && slot_end(a) > b
}

/// Every slot start of the day, ascending, from 09:00 through 20:00.
pub fn slot_starts(day: NaiveDate) -> impl Iterator<Item = NaiveDateTime> {
    let (day_start, day_end) = working_day(day);
    let last = day_end - slot_duration();
    std::iter::successors(Some(day_start), |slot| Some(*slot + slot_duration()))
        .take_while(move |slot| *slot <= last)
}
