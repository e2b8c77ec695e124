use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::{error::ClockError, handle::ClockHandle};

/// An absolute point in time given as a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeInput {
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// RFC 3339 or RFC 2822 text.
    Text(String),
}

impl From<i64> for TimeInput {
    fn from(ms: i64) -> Self {
        Self::EpochMillis(ms)
    }
}

impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Explicit calendar components, interpreted in the host's local timezone.
///
/// Months are 1-based. Omitted trailing components take the host defaults
/// (day 1, midnight). Values outside their natural range roll over into the
/// next larger unit, e.g. month 13 is January of the following year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub year: i32,
    pub month: i64,
    pub day: Option<i64>,
    pub hour: Option<i64>,
    pub minute: Option<i64>,
    pub second: Option<i64>,
    pub millisecond: Option<i64>,
}

impl CalendarFields {
    pub fn new(year: i32, month: i64) -> Self {
        Self {
            year,
            month,
            day: None,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
        }
    }

    pub fn day(mut self, day: i64) -> Self {
        self.day = Some(day);
        self
    }

    pub fn time(mut self, hour: i64, minute: i64, second: i64) -> Self {
        self.hour = Some(hour);
        self.minute = Some(minute);
        self.second = Some(second);
        self
    }

    pub fn millisecond(mut self, millisecond: i64) -> Self {
        self.millisecond = Some(millisecond);
        self
    }

    fn to_naive(self) -> Option<NaiveDateTime> {
        let months = i64::from(self.year) * 12 + self.month - 1;
        let year = i32::try_from(months.div_euclid(12)).ok()?;
        let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
        let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;

        [
            TimeDelta::try_days(self.day.unwrap_or(1) - 1)?,
            TimeDelta::try_hours(self.hour.unwrap_or(0))?,
            TimeDelta::try_minutes(self.minute.unwrap_or(0))?,
            TimeDelta::try_seconds(self.second.unwrap_or(0))?,
            TimeDelta::try_milliseconds(self.millisecond.unwrap_or(0))?,
        ]
        .into_iter()
        .try_fold(start, |at, delta| at.checked_add_signed(delta))
    }
}

/// Arguments to the time factory, by arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeArgs {
    /// No arguments: the simulated "now".
    Now,
    /// One argument: an absolute instant, not shifted.
    Absolute(TimeInput),
    /// Several arguments: calendar components, not shifted.
    Calendar(CalendarFields),
}

impl<C> ClockHandle<C>
where
    C: Send + Sync + 'static,
{
    /// Host time shifted by the effective simulated offset.
    pub fn now(&self) -> DateTime<Utc> {
        let offset = i64::try_from(self.offset()).unwrap_or(i64::MAX);
        self.config()
            .time_source
            .host_now()
            .checked_add_signed(TimeDelta::milliseconds(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// An absolute instant. Simulated time does not apply.
    pub fn at(&self, input: impl Into<TimeInput>) -> Result<DateTime<Utc>, ClockError> {
        match input.into() {
            TimeInput::EpochMillis(ms) => DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                ClockError::InvalidTime(format!("{ms}ms since epoch is out of range"))
            }),
            TimeInput::Text(text) => DateTime::parse_from_rfc3339(&text)
                .or_else(|_| DateTime::parse_from_rfc2822(&text))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ClockError::InvalidTime(format!("cannot parse '{text}': {e}"))),
        }
    }

    /// A local calendar time. Simulated time does not apply.
    pub fn from_calendar(&self, fields: CalendarFields) -> Result<DateTime<Utc>, ClockError> {
        let naive = fields
            .to_naive()
            .ok_or_else(|| ClockError::InvalidTime(format!("{fields:?} is out of range")))?;
        let local = Local.from_local_datetime(&naive).earliest().or_else(|| {
            // Skipped by a DST transition: move past the gap.
            let shifted = naive.checked_add_signed(TimeDelta::try_hours(1)?)?;
            Local.from_local_datetime(&shifted).earliest()
        });
        local
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ClockError::InvalidTime(format!("{naive} does not exist locally")))
    }

    /// Dispatch on arity, the way a host date constructor does.
    pub fn date(&self, args: TimeArgs) -> Result<DateTime<Utc>, ClockError> {
        match args {
            TimeArgs::Now => Ok(self.now()),
            TimeArgs::Absolute(input) => self.at(input),
            TimeArgs::Calendar(fields) => self.from_calendar(fields),
        }
    }
}
