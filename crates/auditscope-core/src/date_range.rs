//! Date range presets and their resolution to concrete intervals.
//!
//! Resolution is a pure function of the preset, the instant "now", and the
//! optional custom range. Calendar boundaries (midnight, week, month,
//! quarter) are computed in the resolver's fixed UTC offset.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Named date range shorthand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatePreset {
    /// No bounds at all.
    AllTime,
    /// The last 24 hours.
    Last24Hours,
    /// Since local midnight.
    Today,
    /// The full previous local day.
    Yesterday,
    /// Since midnight of the most recent Sunday.
    ThisWeek,
    /// The last 7 days.
    Last7Days,
    /// Since the first of the current month.
    ThisMonth,
    /// The last 30 days.
    Last30Days,
    /// Since the first day of the current quarter.
    ThisQuarter,
    /// The last 90 days.
    Last90Days,
    /// The last 6 calendar months.
    Last6Months,
    /// The last 12 calendar months.
    LastYear,
    /// Operator-chosen calendar dates.
    Custom,
}

impl DatePreset {
    /// Every preset, in menu order.
    pub const ALL: [Self; 13] = [
        Self::AllTime,
        Self::Last24Hours,
        Self::Today,
        Self::Yesterday,
        Self::ThisWeek,
        Self::Last7Days,
        Self::ThisMonth,
        Self::Last30Days,
        Self::ThisQuarter,
        Self::Last90Days,
        Self::Last6Months,
        Self::LastYear,
        Self::Custom,
    ];

    /// Returns the kebab-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllTime => "all-time",
            Self::Last24Hours => "last-24-hours",
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this-week",
            Self::Last7Days => "last-7-days",
            Self::ThisMonth => "this-month",
            Self::Last30Days => "last-30-days",
            Self::ThisQuarter => "this-quarter",
            Self::Last90Days => "last-90-days",
            Self::Last6Months => "last-6-months",
            Self::LastYear => "last-year",
            Self::Custom => "custom",
        }
    }

    /// Returns true if the interval's upper bound is "now".
    pub const fn is_rolling(self) -> bool {
        !matches!(self, Self::AllTime | Self::Yesterday | Self::Custom)
    }
}

impl fmt::Display for DatePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == needle)
            .ok_or_else(|| Error::UnknownPreset {
                name: s.to_string(),
            })
    }
}

/// Inclusive calendar date range for the [`DatePreset::Custom`] selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomRange {
    /// First included day.
    pub start: NaiveDate,
    /// Last included day.
    pub end: NaiveDate,
}

impl CustomRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Checks that the range is not inverted and that both ends can be
    /// resolved in any offset.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.start.pred_opt().is_none() {
            return Err(Error::DateOutOfRange { date: self.start });
        }
        if self.end.succ_opt().is_none() {
            return Err(Error::DateOutOfRange { date: self.end });
        }
        Ok(())
    }
}

/// Concrete half-open interval `[start, end)`; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResolvedInterval {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl ResolvedInterval {
    /// The interval with no bounds.
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Creates a bounded interval.
    pub const fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Returns true if `instant` falls inside the interval.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| instant >= start)
            && self.end.map_or(true, |end| instant < end)
    }

    /// Returns true if the two intervals share at least one instant.
    pub fn overlaps(&self, other: &Self) -> bool {
        let starts_before_other_ends = match (self.start, other.end) {
            (Some(start), Some(end)) => start < end,
            _ => true,
        };
        let other_starts_before_end = match (other.start, self.end) {
            (Some(start), Some(end)) => start < end,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_end
    }
}

/// Maps presets to concrete intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeResolver {
    offset: FixedOffset,
}

impl Default for DateRangeResolver {
    fn default() -> Self {
        Self::utc()
    }
}

impl DateRangeResolver {
    /// Creates a resolver computing calendar boundaries in `offset`.
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Creates a resolver computing calendar boundaries in UTC.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Returns the offset used for calendar boundaries.
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns the calendar date of `instant` in the resolver offset.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Resolves `preset` against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCustomRange`] for [`DatePreset::Custom`]
    /// without a range, [`Error::InvalidRange`] if the range is inverted, and
    /// [`Error::DateOutOfRange`] if a bound falls off the calendar.
    pub fn resolve(
        &self,
        preset: DatePreset,
        now: DateTime<Utc>,
        custom: Option<&CustomRange>,
    ) -> Result<ResolvedInterval> {
        let today = self.local_date(now);
        let midnight = self.start_of_day(today)?;

        let interval = match preset {
            DatePreset::AllTime => ResolvedInterval::unbounded(),
            DatePreset::Last24Hours => {
                ResolvedInterval::between(shift_back(now, TimeDelta::hours(24))?, now)
            }
            DatePreset::Last7Days => {
                ResolvedInterval::between(shift_back(now, TimeDelta::days(7))?, now)
            }
            DatePreset::Last30Days => {
                ResolvedInterval::between(shift_back(now, TimeDelta::days(30))?, now)
            }
            DatePreset::Last90Days => {
                ResolvedInterval::between(shift_back(now, TimeDelta::days(90))?, now)
            }
            DatePreset::Last6Months => ResolvedInterval::between(self.months_before(now, 6)?, now),
            DatePreset::LastYear => ResolvedInterval::between(self.months_before(now, 12)?, now),
            DatePreset::Today => ResolvedInterval::between(midnight, now),
            DatePreset::Yesterday => {
                ResolvedInterval::between(shift_back(midnight, TimeDelta::days(1))?, midnight)
            }
            DatePreset::ThisWeek => {
                let since_sunday = i64::from(today.weekday().num_days_from_sunday());
                ResolvedInterval::between(shift_back(midnight, TimeDelta::days(since_sunday))?, now)
            }
            DatePreset::ThisMonth => {
                let first = today.with_day(1).unwrap_or(today);
                ResolvedInterval::between(self.start_of_day(first)?, now)
            }
            DatePreset::ThisQuarter => {
                let first_of_month = today.with_day(1).unwrap_or(today);
                let quarter = today.month0() / 3;
                let first = first_of_month
                    .with_month0(quarter * 3)
                    .unwrap_or(first_of_month);
                ResolvedInterval::between(self.start_of_day(first)?, now)
            }
            DatePreset::Custom => {
                let range = custom.ok_or(Error::MissingCustomRange)?;
                range.validate()?;
                let after_end = range
                    .end
                    .succ_opt()
                    .ok_or(Error::DateOutOfRange { date: range.end })?;
                ResolvedInterval::between(
                    self.start_of_day(range.start)?,
                    self.start_of_day(after_end)?,
                )
            }
        };

        Ok(interval)
    }

    /// Returns the UTC instant of local midnight on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateOutOfRange`] if the instant is not representable.
    pub fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc = local_midnight
            .checked_sub_signed(TimeDelta::seconds(i64::from(self.offset.local_minus_utc())))
            .ok_or(Error::DateOutOfRange { date })?;
        Ok(Utc.from_utc_datetime(&utc))
    }

    fn months_before(&self, now: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
        match now
            .with_timezone(&self.offset)
            .checked_sub_months(Months::new(months))
        {
            Some(local) => Ok(local.with_timezone(&Utc)),
            None => shift_back(now, TimeDelta::days(i64::from(months) * 30)),
        }
    }
}

fn shift_back(instant: DateTime<Utc>, delta: TimeDelta) -> Result<DateTime<Utc>> {
    instant
        .checked_sub_signed(delta)
        .ok_or(Error::DateOutOfRange {
            date: instant.date_naive(),
        })
}
