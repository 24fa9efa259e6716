//! Job triggers: a fixed interval, a daily wall-clock time, or both.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

use crate::SchedulerError;

/// Parse `"30m"`, `"6h"`, `"1d"`; a bare number means minutes.
pub fn parse_interval(spec: &str) -> Result<Duration, SchedulerError> {
    let spec = spec.trim();
    let invalid = || SchedulerError::InvalidInterval(spec.to_string());

    let (digits, unit_secs) = match spec.chars().last() {
        Some('m') => (&spec[..spec.len() - 1], 60),
        Some('h') => (&spec[..spec.len() - 1], 3_600),
        Some('d') => (&spec[..spec.len() - 1], 86_400),
        Some(c) if c.is_ascii_digit() => (spec, 60),
        _ => return Err(invalid()),
    };
    let n: u64 = digits.parse().map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    n.checked_mul(unit_secs).map(Duration::from_secs).ok_or_else(invalid)
}

/// Parse a daily `"HH:MM"` time.
pub fn parse_daily_time(spec: &str) -> Result<NaiveTime, SchedulerError> {
    NaiveTime::parse_from_str(spec.trim(), "%H:%M")
        .map_err(|_| SchedulerError::InvalidTime(spec.to_string()))
}

/// When a job fires. With both set, the job fires on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub interval: Option<Duration>,
    /// Local wall-clock time.
    pub daily_at: Option<NaiveTime>,
}

impl Trigger {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            daily_at: None,
        }
    }

    pub fn daily(at: NaiveTime) -> Self {
        Self {
            interval: None,
            daily_at: Some(at),
        }
    }

    pub fn with_daily(mut self, at: NaiveTime) -> Self {
        self.daily_at = Some(at);
        self
    }

    /// Build from config strings; at least one must be present.
    pub fn parse(job: &str, interval: Option<&str>, daily_at: Option<&str>) -> Result<Self, SchedulerError> {
        let trigger = Self {
            interval: interval.map(parse_interval).transpose()?,
            daily_at: daily_at.map(parse_daily_time).transpose()?,
        };
        if trigger.interval.is_none() && trigger.daily_at.is_none() {
            return Err(SchedulerError::NoTrigger(job.to_string()));
        }
        Ok(trigger)
    }
}

fn after(now: DateTime<Utc>, d: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
}

/// First occurrence of `time` strictly after `now`, in `now`'s time zone.
///
/// Times skipped by a DST jump fall through to the next day.
pub fn next_daily_after<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() {
            if candidate > *now {
                return Some(candidate.with_timezone(&Utc));
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// Per-job firing state kept by the scheduler loop.
#[derive(Debug, Clone)]
pub(crate) struct TriggerClock {
    trigger: Trigger,
    next_interval: Option<DateTime<Utc>>,
    next_daily: Option<DateTime<Utc>>,
}

impl TriggerClock {
    /// Interval jobs first fire one interval after `now`.
    pub(crate) fn start(trigger: Trigger, now: DateTime<Utc>) -> Self {
        Self {
            trigger,
            next_interval: trigger.interval.and_then(|d| after(now, d)),
            next_daily: trigger
                .daily_at
                .and_then(|t| next_daily_after(t, &now.with_timezone(&Local))),
        }
    }

    /// True if the job is due at `now`; advances whichever trigger fired.
    pub(crate) fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let mut due = false;
        if let (Some(at), Some(interval)) = (self.next_interval, self.trigger.interval) {
            if now >= at {
                due = true;
                self.next_interval = after(now, interval);
            }
        }
        if let (Some(at), Some(time)) = (self.next_daily, self.trigger.daily_at) {
            if now >= at {
                due = true;
                self.next_daily = next_daily_after(time, &now.with_timezone(&Local));
            }
        }
        due
    }

    pub(crate) fn next_run(&self) -> Option<DateTime<Utc>> {
        match (self.next_interval, self.next_daily) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
