//! Promotion gate
//!
//! Decides whether a package may move from the test track to stable right
//! now. Every unmet constraint defers the promotion; nothing here is an
//! error except a malformed configuration.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Days of the week on which promotion is permitted.
///
/// Parsed from a digit string where `0` is Monday and `6` is Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekdaySet(BTreeSet<u8>);

impl WeekdaySet {
    pub fn from_digits(digits: &str) -> Result<Self> {
        let mut days = BTreeSet::new();
        for ch in digits.chars().filter(|c| !c.is_whitespace()) {
            match ch.to_digit(10) {
                Some(day) if day <= 6 => {
                    days.insert(day as u8);
                }
                _ => {
                    return Err(PipelineError::Config(format!(
                        "invalid weekday '{ch}' in '{digits}', use digits 0 (Monday) to 6 (Sunday)"
                    )));
                }
            }
        }
        Ok(Self(days))
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0.contains(&(weekday.num_days_from_monday() as u8))
    }
}

impl TryFrom<String> for WeekdaySet {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_digits(&value)
    }
}

impl From<WeekdaySet> for String {
    fn from(value: WeekdaySet) -> Self {
        value.0.iter().map(|day| day.to_string()).collect()
    }
}

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| PipelineError::Config(format!("invalid time '{value}', expected HH:MM")))
}

/// Constraints for one promotion decision. Absent fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    pub weekdays: Option<WeekdaySet>,
    pub not_before: Option<NaiveTime>,
    pub not_after: Option<NaiveTime>,
    pub min_dwell_days: Option<u32>,
}

impl GateConfig {
    /// Whether a dwell reference must be fetched before evaluating.
    pub fn requires_dwell(&self) -> bool {
        self.min_dwell_days.is_some_and(|days| days > 0)
    }
}

/// When the package entered the stage being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellReference {
    /// No dwell constraint configured, nothing was fetched
    NotRequired,
    /// The stamp could not be read from the patch policy
    Unrecognized,
    EnteredOn(NaiveDate),
}

impl From<Option<NaiveDate>> for DwellReference {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(DwellReference::Unrecognized, DwellReference::EnteredOn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    Weekday(Weekday),
    TooEarly { now: NaiveTime, not_before: NaiveTime },
    TooLate { now: NaiveTime, not_after: NaiveTime },
    Dwell { elapsed_days: i64, required_days: u32 },
    TestTrackDisabled,
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitReason::Weekday(day) => write!(f, "promotion not permitted on {day}"),
            WaitReason::TooEarly { now, not_before } => {
                write!(f, "{} is before {}", now.format("%H:%M"), not_before.format("%H:%M"))
            }
            WaitReason::TooLate { now, not_after } => {
                write!(f, "{} is after {}", now.format("%H:%M"), not_after.format("%H:%M"))
            }
            WaitReason::Dwell {
                elapsed_days,
                required_days,
            } => write!(
                f,
                "in test for {elapsed_days} days, {required_days} required"
            ),
            WaitReason::TestTrackDisabled => f.write_str("test policy is disabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Go,
    Wait(WaitReason),
    /// The decision inputs were not understood
    Skip(String),
}

impl GateDecision {
    pub fn is_go(&self) -> bool {
        matches!(self, GateDecision::Go)
    }
}

/// Evaluate the gate at `now`.
///
/// Rules run in order: weekday, earliest time, latest time, minimum dwell.
/// The first failing rule decides.
pub fn evaluate(now: NaiveDateTime, config: &GateConfig, dwell: DwellReference) -> GateDecision {
    if let Some(weekdays) = &config.weekdays
        && !weekdays.contains(now.weekday())
    {
        return GateDecision::Wait(WaitReason::Weekday(now.weekday()));
    }

    let time = now.time();
    if let Some(not_before) = config.not_before
        && time < not_before
    {
        return GateDecision::Wait(WaitReason::TooEarly {
            now: time,
            not_before,
        });
    }
    if let Some(not_after) = config.not_after
        && time > not_after
    {
        return GateDecision::Wait(WaitReason::TooLate {
            now: time,
            not_after,
        });
    }

    if let Some(required_days) = config.min_dwell_days.filter(|days| *days > 0) {
        let entered = match dwell {
            DwellReference::EnteredOn(date) => date,
            DwellReference::Unrecognized | DwellReference::NotRequired => {
                return GateDecision::Skip(
                    "stage entry date not understood, cannot measure dwell time".to_string(),
                );
            }
        };
        let elapsed_days = elapsed_days(now, entered);
        if elapsed_days < i64::from(required_days) {
            return GateDecision::Wait(WaitReason::Dwell {
                elapsed_days,
                required_days,
            });
        }
    }

    GateDecision::Go
}

/// Whole days between the start of `since` and `now`, rounded down.
fn elapsed_days(now: NaiveDateTime, since: NaiveDate) -> i64 {
    // the time of day is always less than a full day, so the floor of the
    // fractional difference equals the calendar-date difference
    now.date().signed_duration_since(since).num_days()
}
