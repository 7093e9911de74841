use std::time::{SystemTime, UNIX_EPOCH};

use atoi::FromRadix10;

use crate::{
    Error,
    handles::Value,
    sys::{Date, Interval, Time, Timestamp},
};

/// Which parts of a [`NormalizedTime`] carry information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Date,
    Time,
    DateTime,
}

/// Intermediate representation all temporal conversions go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedTime {
    pub kind: TimeKind,
    pub negative: bool,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Not limited to 23 for time values.
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Nanoseconds
    pub fraction: u32,
}

impl NormalizedTime {
    fn date(year: i32, month: u32, day: u32) -> Self {
        NormalizedTime {
            kind: TimeKind::Date,
            negative: false,
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            fraction: 0,
        }
    }

    /// Temporal value of a server field. `None` for values which are not temporal. Text is parsed.
    pub fn from_value(value: &Value) -> Result<Option<Self>, Error> {
        let normalized = match value {
            Value::Date(d) => Self::from(*d),
            Value::Time(t) => Self::from(*t),
            Value::Timestamp(ts) => Self::from(*ts),
            Value::Text(text) => parse_temporal(text)?,
            _ => return Ok(None),
        };
        Ok(Some(normalized))
    }

    /// `false` if a field is outside of its calendar or clock range.
    pub fn is_valid(&self) -> bool {
        validate(self)
    }

    pub fn has_time(&self) -> bool {
        self.hour != 0 || self.minute != 0 || self.second != 0 || self.fraction != 0
    }

    pub fn to_date(&self) -> Result<Date, Error> {
        if self.kind == TimeKind::Time {
            return Err(Error::InvalidDatetimeFormat(
                "A time value has no date part".to_owned(),
            ));
        }
        Ok(Date {
            year: self.year as i16,
            month: self.month as u16,
            day: self.day as u16,
        })
    }

    pub fn to_time(&self) -> Result<Time, Error> {
        if self.negative || self.hour > 23 {
            return Err(Error::InvalidDatetimeFormat(format!(
                "Time of day out of range: {}{}h",
                if self.negative { "-" } else { "" },
                self.hour
            )));
        }
        Ok(Time {
            hour: self.hour as u16,
            minute: self.minute as u16,
            second: self.second as u16,
        })
    }

    /// Times without a date are placed on the current day.
    pub fn to_timestamp(&self) -> Result<Timestamp, Error> {
        let date = match self.kind {
            TimeKind::Time => {
                self.to_time()?;
                today()
            }
            TimeKind::Date | TimeKind::DateTime => self.to_date()?,
        };
        Ok(Timestamp {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: self.hour as u16,
            minute: self.minute as u16,
            second: self.second as u16,
            fraction: self.fraction,
        })
    }

    pub fn to_interval(&self) -> Interval {
        Interval {
            negative: self.negative,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            fraction: self.fraction,
        }
    }
}

impl From<Date> for NormalizedTime {
    fn from(d: Date) -> Self {
        NormalizedTime::date(i32::from(d.year), u32::from(d.month), u32::from(d.day))
    }
}

impl From<Time> for NormalizedTime {
    fn from(t: Time) -> Self {
        NormalizedTime {
            kind: TimeKind::Time,
            hour: u32::from(t.hour),
            minute: u32::from(t.minute),
            second: u32::from(t.second),
            ..NormalizedTime::date(0, 0, 0)
        }
    }
}

impl From<Interval> for NormalizedTime {
    fn from(i: Interval) -> Self {
        NormalizedTime {
            kind: TimeKind::Time,
            negative: i.negative,
            hour: i.hour,
            minute: i.minute,
            second: i.second,
            fraction: i.fraction,
            ..NormalizedTime::date(0, 0, 0)
        }
    }
}

impl From<Timestamp> for NormalizedTime {
    fn from(ts: Timestamp) -> Self {
        NormalizedTime {
            kind: TimeKind::DateTime,
            hour: u32::from(ts.hour),
            minute: u32::from(ts.minute),
            second: u32::from(ts.second),
            fraction: ts.fraction,
            ..NormalizedTime::date(i32::from(ts.year), u32::from(ts.month), u32::from(ts.day))
        }
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.ffffff]` (also with `T` as separator) and
/// `[-]HHH:MM[:SS[.ffffff]]`.
pub fn parse_temporal(text: &[u8]) -> Result<NormalizedTime, Error> {
    let text = text.trim_ascii();
    let invalid = || Error::InvalidDatetimeFormat(String::from_utf8_lossy(text).into_owned());

    let (date_part, time_part) = match text.iter().position(|&b| b == b' ' || b == b'T') {
        Some(split) => (Some(&text[..split]), Some(text[split + 1..].trim_ascii_start())),
        None if text.contains(&b'-') && !text.starts_with(b"-") => (Some(text), None),
        None => (None, Some(text)),
    };

    let mut normalized = match date_part {
        Some(date) => {
            let fields = split_fields(date, b'-').ok_or_else(invalid)?;
            let [year, month, day] = fields[..] else {
                return Err(invalid());
            };
            NormalizedTime::date(year as i32, month, day)
        }
        None => NormalizedTime {
            kind: TimeKind::Time,
            ..NormalizedTime::date(0, 0, 0)
        },
    };

    if let Some(time) = time_part {
        let (negative, time) = match time.strip_prefix(b"-") {
            Some(rest) => (true, rest),
            None => (false, time),
        };
        let (clock, fraction) = match time.iter().position(|&b| b == b'.') {
            Some(dot) => (&time[..dot], Some(&time[dot + 1..])),
            None => (time, None),
        };
        let fields = split_fields(clock, b':').ok_or_else(invalid)?;
        let (hour, minute, second) = match fields[..] {
            [hour, minute] => (hour, minute, 0),
            [hour, minute, second] => (hour, minute, second),
            _ => return Err(invalid()),
        };
        normalized.negative = negative;
        normalized.hour = hour;
        normalized.minute = minute;
        normalized.second = second;
        normalized.fraction = match fraction {
            Some(digits) => parse_fraction(digits).ok_or_else(invalid)?,
            None => 0,
        };
        if normalized.kind == TimeKind::Date {
            normalized.kind = TimeKind::DateTime;
        }
    }

    validate(&normalized).then_some(normalized).ok_or_else(invalid)
}

fn split_fields(text: &[u8], separator: u8) -> Option<Vec<u32>> {
    text.split(|&b| b == separator)
        .map(|field| {
            let (value, digits) = u32::from_radix_10(field);
            (digits == field.len() && digits != 0).then_some(value)
        })
        .collect()
}

/// Up to nine fractional digits as nanoseconds.
fn parse_fraction(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut nanos = 0u32;
    for position in 0..9 {
        let digit = digits.get(position).map_or(0, |d| u32::from(d - b'0'));
        nanos = nanos * 10 + digit;
    }
    Some(nanos)
}

fn validate(time: &NormalizedTime) -> bool {
    let date_ok = match time.kind {
        TimeKind::Time => true,
        // Zero dates are valid on the server.
        _ if time.year == 0 && time.month == 0 && time.day == 0 => true,
        _ => (1..=12).contains(&time.month) && (1..=31).contains(&time.day),
    };
    let clock_ok = time.minute < 60 && time.second < 60;
    let hour_ok = time.kind == TimeKind::Time || time.hour < 24;
    date_ok && clock_ok && hour_ok
}

/// Current date in UTC.
fn today() -> Date {
    let days = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() / 86_400) as i64;
    civil_from_days(days)
}

/// Gregorian calendar date of the day `days` after 1970-01-01.
fn civil_from_days(days: i64) -> Date {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    Date {
        year: year as i16,
        month: month as u16,
        day: day as u16,
    }
}
