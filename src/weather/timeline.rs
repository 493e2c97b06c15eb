//! Forecast Timeline
//!
//! Forecast data grouped by day, each day an ordered run of fixed-width
//! slots, with the "weather N hours from now" lookup used by every
//! forecast view.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use thiserror::Error;

use super::Conditions;

/// Provider part-of-day flag for a forecast timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfDay {
    Day,
    Night,
}

impl PartOfDay {
    /// Parse the provider's `d`/`n` flag.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "d" => Some(PartOfDay::Day),
            "n" => Some(PartOfDay::Night),
            _ => None,
        }
    }
}

/// Forecast structure violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("Forecast contains no slots")]
    Empty,

    #[error("Forecast day {0} contains no slots")]
    EmptyDay(usize),

    #[error("Slot {slot} of day {day} does not end after it starts")]
    InvalidSlot { day: usize, slot: usize },

    #[error("Slots of day {0} are not contiguous")]
    NotContiguous(usize),

    #[error("Slot durations are not uniform")]
    MixedDurations,

    #[error("Day {0} has fewer slots than the days before it")]
    IncompleteDay(usize),
}

/// One fixed-width forecast bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSlot {
    /// Bucket start
    pub start: DateTime<Utc>,
    /// Bucket end (exclusive)
    pub end: DateTime<Utc>,
    /// Forecast conditions for the bucket
    pub conditions: Conditions,
}

impl ForecastSlot {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Validated forecast, built once per successful fetch and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTimeline {
    days: Vec<Vec<ForecastSlot>>,
}

impl ForecastTimeline {
    /// Build from days of slots, checking the structural invariants.
    pub fn new(days: Vec<Vec<ForecastSlot>>) -> Result<Self, TimelineError> {
        if days.is_empty() {
            return Err(TimelineError::Empty);
        }

        let mut duration: Option<Duration> = None;
        let mut full_day_len: Option<usize> = None;
        let last_day = days.len() - 1;

        for (d, day) in days.iter().enumerate() {
            if day.is_empty() {
                return Err(TimelineError::EmptyDay(d));
            }

            for (s, slot) in day.iter().enumerate() {
                if slot.end <= slot.start {
                    return Err(TimelineError::InvalidSlot { day: d, slot: s });
                }
                match duration {
                    Some(expected) if expected != slot.duration() => {
                        return Err(TimelineError::MixedDurations)
                    }
                    Some(_) => {}
                    None => duration = Some(slot.duration()),
                }
                if s > 0 && day[s - 1].end != slot.start {
                    return Err(TimelineError::NotContiguous(d));
                }
            }

            // Only the last day may be partial
            match full_day_len {
                None => full_day_len = Some(day.len()),
                Some(len) if day.len() == len => {}
                Some(len) if d == last_day && day.len() < len => {}
                Some(_) => return Err(TimelineError::IncompleteDay(d)),
            }
        }

        Ok(Self { days })
    }

    /// Group a flat, ordered slot list into days of `slots_per_day`.
    pub fn from_slots(slots: Vec<ForecastSlot>, slots_per_day: usize) -> Result<Self, TimelineError> {
        let per_day = slots_per_day.max(1);
        let mut days = Vec::with_capacity(slots.len().div_ceil(per_day));
        let mut current = Vec::with_capacity(per_day);

        for slot in slots {
            current.push(slot);
            if current.len() == per_day {
                days.push(std::mem::replace(&mut current, Vec::with_capacity(per_day)));
            }
        }
        if !current.is_empty() {
            days.push(current);
        }

        Self::new(days)
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Slots of day `index`, if present.
    pub fn day(&self, index: usize) -> Option<&[ForecastSlot]> {
        self.days.get(index).map(Vec::as_slice)
    }

    pub fn days_iter(&self) -> impl Iterator<Item = &[ForecastSlot]> {
        self.days.iter().map(Vec::as_slice)
    }

    pub fn first_slot(&self) -> &ForecastSlot {
        // Construction guarantees at least one non-empty day
        &self.days[0][0]
    }

    pub fn last_slot(&self) -> &ForecastSlot {
        let day = &self.days[self.days.len() - 1];
        &day[day.len() - 1]
    }

    /// Width of every slot.
    pub fn slot_duration(&self) -> Duration {
        self.first_slot().duration()
    }

    /// End of the covered range.
    pub fn covered_until(&self) -> DateTime<Utc> {
        self.last_slot().end
    }

    /// The slot covering `now + hours`.
    ///
    /// Targets before the first slot resolve to the first slot of the day
    /// they fall into; targets past the covered range saturate to the very
    /// last slot. Offsets too large to represent resolve to the first or
    /// last slot by sign.
    pub fn at_offset_hours(&self, now: DateTime<Utc>, hours: i64) -> &ForecastSlot {
        let target = match Duration::try_hours(hours).and_then(|d| now.checked_add_signed(d)) {
            Some(target) => target,
            None if hours < 0 => return self.first_slot(),
            None => return self.last_slot(),
        };

        for day in &self.days {
            let (first, last) = (&day[0], &day[day.len() - 1]);
            if target > last.end {
                continue;
            }

            let distance_hours = (target - first.start).num_seconds() as f64 / 3600.0;
            let slot_hours = last.duration().num_seconds() as f64 / 3600.0;
            let index = (distance_hours / slot_hours).ceil();
            let index = if index <= 0.0 {
                0
            } else {
                (index as usize).min(day.len() - 1)
            };
            return &day[index];
        }

        self.last_slot()
    }

    /// Four slots for the rest of today: now, +3h, +6h, +9h.
    pub fn today(&self, now: DateTime<Utc>) -> Vec<&ForecastSlot> {
        [0, 3, 6, 9]
            .into_iter()
            .map(|h| self.at_offset_hours(now, h))
            .collect()
    }

    /// Forecast for the next `count` days, one slot per bucket from local
    /// midnight onward.
    ///
    /// The day count is limited to the covered days minus today.
    pub fn days<Tz: TimeZone>(&self, now: &DateTime<Tz>, count: usize) -> Vec<Vec<&ForecastSlot>> {
        let slot_hours = (self.slot_duration().num_hours()).max(1);
        let per_day = (24 / slot_hours).max(1);
        let hours_to_midnight = 24 - i64::from(now.hour());
        let count = count.min(self.days.len().saturating_sub(1));
        let now_utc = now.with_timezone(&Utc);

        (0..count as i64)
            .map(|day| {
                (0..per_day)
                    .map(|slot| {
                        self.at_offset_hours(now_utc, day * 24 + hours_to_midnight + slot * slot_hours)
                    })
                    .collect()
            })
            .collect()
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Move today's sunrise or sunset to tomorrow.
///
/// The provider reports both events for the current calendar date. When the
/// first forecast slot is daytime the next sunrise is tomorrow's; when it is
/// night the next sunset is tomorrow's. The shift is one local calendar day
/// in `now`'s timezone.
pub fn correct_sun_times<Tz: TimeZone>(
    sunrise: DateTime<Utc>,
    sunset: DateTime<Utc>,
    first_slot: PartOfDay,
    now: &DateTime<Tz>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let this_morning = local_midnight(&tz, today);
    let midnight = today.succ_opt().and_then(|d| local_midnight(&tz, d));

    let day_length = match (this_morning, midnight) {
        (Some(start), Some(end)) => end - start,
        _ => Duration::hours(24),
    };

    match first_slot {
        PartOfDay::Day => (sunrise + day_length, sunset),
        PartOfDay::Night => (sunrise, sunset + day_length),
    }
}
