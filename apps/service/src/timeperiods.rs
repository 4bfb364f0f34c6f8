//! Timeperiods defined in the service configuration.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Timelike, Weekday};
use hostcheck::{TimeperiodError, TimeperiodOracle};
use serde::{Deserialize, Serialize};

/// Weekly schedule of one timeperiod
///
/// ```toml
/// [timeperiods.work]
/// days = ["mon", "tue", "wed", "thu", "fri"]
/// ranges = ["08:00-12:00", "13:00-17:00"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeperiodSchedule {
    /// Days the ranges apply to; all days when empty
    #[serde(default)]
    pub days: Vec<Weekday>,
    /// `HH:MM-HH:MM` ranges, end exclusive; `24:00` ends at midnight
    pub ranges: Vec<String>,
}

fn parse_clock(text: &str) -> Option<u32> {
    if text.trim() == "24:00" {
        return Some(24 * 60);
    }
    let time = NaiveTime::parse_from_str(text.trim(), "%H:%M").ok()?;
    Some(time.hour() * 60 + time.minute())
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    let (start, end) = range.split_once('-')?;
    Some((parse_clock(start)?, parse_clock(end)?))
}

impl TimeperiodSchedule {
    /// Whether `at` falls into one of the ranges
    pub fn contains(&self, at: NaiveDateTime) -> Result<bool, String> {
        if !self.days.is_empty() && !self.days.contains(&at.weekday()) {
            return Ok(false);
        }
        let minute = at.hour() * 60 + at.minute();
        for range in &self.ranges {
            let (start, end) =
                parse_range(range).ok_or_else(|| format!("invalid time range '{range}'"))?;
            if start <= minute && minute < end {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Display for TimeperiodSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days.is_empty() {
            write!(f, "daily")?;
        } else {
            let days: Vec<String> = self.days.iter().map(ToString::to_string).collect();
            write!(f, "{}", days.join(","))?;
        }
        write!(f, " {}", self.ranges.join(" "))
    }
}

/// Answers timeperiod questions from the configured schedules, in local time
#[derive(Debug, Clone, Default)]
pub struct ScheduleOracle {
    periods: BTreeMap<String, TimeperiodSchedule>,
}

impl ScheduleOracle {
    pub fn new(periods: BTreeMap<String, TimeperiodSchedule>) -> Self {
        Self { periods }
    }

    pub fn is_active_at(
        &self,
        timeperiod: &str,
        at: NaiveDateTime,
    ) -> Result<bool, TimeperiodError> {
        // the builtin period of every monitoring core
        if timeperiod == "24X7" {
            return Ok(true);
        }
        let schedule = self
            .periods
            .get(timeperiod)
            .ok_or_else(|| TimeperiodError::new(timeperiod, "timeperiod not defined"))?;

        schedule.contains(at).map_err(|reason| TimeperiodError::new(timeperiod, reason))
    }
}

impl TimeperiodOracle for ScheduleOracle {
    fn is_active(&self, timeperiod: &str) -> Result<bool, TimeperiodError> {
        self.is_active_at(timeperiod, Local::now().naive_local())
    }
}
