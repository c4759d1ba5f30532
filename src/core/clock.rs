//! Time authority for every exam-window decision.
//!
//! The institution runs on a fixed UTC+3 civil offset with no daylight-saving rules.
//! Persisted instants are UTC values without an offset (`PrimitiveDateTime`); policy
//! comparisons convert "now" into that representation first.

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::{format_description, offset};
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub(crate) const CIVIL_OFFSET: UtcOffset = offset!(+3);

const CIVIL_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const CIVIL_FORMAT_SUBSECOND: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
const CIVIL_FORMAT_MINUTES: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

/// Offset shapes beyond RFC 3339: minute precision, and basic `+hhmm` offsets.
const OFFSET_FORMATS: [&[FormatItem<'static>]; 4] = [
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory][offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
    ),
];
const NAIVE_FORMATS: [&[FormatItem<'static>]; 3] =
    [CIVIL_FORMAT, CIVIL_FORMAT_SUBSECOND, CIVIL_FORMAT_MINUTES];

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TimeParseError {
    #[error("empty date string")]
    Empty,
    #[error("invalid date format: {0}")]
    Invalid(String),
}

pub(crate) trait Clock: Send + Sync {
    /// Current instant at the civil offset.
    fn now(&self) -> OffsetDateTime;

    /// Current instant in the stored UTC representation.
    fn now_utc(&self) -> PrimitiveDateTime {
        to_primitive_utc(self.now())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(CIVIL_OFFSET)
    }
}

/// Settable clock for deterministic tests.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct FixedClock {
    current: std::sync::Mutex<OffsetDateTime>,
}

#[cfg(test)]
impl FixedClock {
    pub(crate) fn at(utc: PrimitiveDateTime) -> Self {
        Self { current: std::sync::Mutex::new(utc.assume_utc().to_offset(CIVIL_OFFSET)) }
    }

    pub(crate) fn set(&self, utc: PrimitiveDateTime) {
        *self.current.lock().expect("clock lock") = utc.assume_utc().to_offset(CIVIL_OFFSET);
    }

    pub(crate) fn advance(&self, by: time::Duration) {
        let mut current = self.current.lock().expect("clock lock");
        *current += by;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.current.lock().expect("clock lock")
    }
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

/// Parses a client-supplied date string into stored UTC.
///
/// Strings carrying `Z` or an explicit offset (`+hh:mm` or `+hhmm`) are taken at face
/// value. Naive strings (`YYYY-MM-DD[T| ]HH:MM[:SS[.fff]]`) are civil UTC+3 time regardless
/// of where the client happens to be.
pub(crate) fn parse_civil(value: &str) -> Result<PrimitiveDateTime, TimeParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TimeParseError::Empty);
    }
    let normalized = normalize_iso(value);

    if let Ok(parsed) = OffsetDateTime::parse(&normalized, &Rfc3339) {
        return Ok(to_primitive_utc(parsed));
    }
    if let Some(parsed) =
        OFFSET_FORMATS.iter().find_map(|format| OffsetDateTime::parse(&normalized, format).ok())
    {
        return Ok(to_primitive_utc(parsed));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(&normalized, format).ok())
        .ok_or_else(|| TimeParseError::Invalid(value.to_string()))?;

    Ok(to_primitive_utc(naive.assume_offset(CIVIL_OFFSET)))
}

/// `T` as the date/time separator and `+00:00` in place of a trailing `Z`.
fn normalize_iso(value: &str) -> String {
    let mut normalized = value.to_string();
    if normalized.as_bytes().get(10) == Some(&b' ') {
        normalized.replace_range(10..11, "T");
    }
    if normalized.ends_with(['Z', 'z']) {
        normalized.pop();
        normalized.push_str("+00:00");
    }
    normalized
}

/// Renders stored UTC as naive civil time, the shape the legacy client sends back.
///
/// Sub-second precision is kept when present so the value parses back unchanged.
pub(crate) fn format_civil(value: PrimitiveDateTime) -> String {
    let civil = value.assume_utc().to_offset(CIVIL_OFFSET);
    let format = if civil.nanosecond() == 0 { CIVIL_FORMAT } else { CIVIL_FORMAT_SUBSECOND };
    civil.format(format).unwrap_or_else(|_| civil.to_string())
}

/// Civil time at minute precision, the shape of an HTML `datetime-local` input.
pub(crate) fn format_civil_minutes(value: OffsetDateTime) -> String {
    let civil = value.to_offset(CIVIL_OFFSET);
    civil.format(CIVIL_FORMAT_MINUTES).unwrap_or_else(|_| civil.to_string())
}

pub(crate) fn format_utc(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Serializers writing stored UTC as RFC 3339 with `Z`.
pub(crate) mod utc_serde {
    use serde::Serializer;
    use time::PrimitiveDateTime;

    pub(crate) fn serialize<S: Serializer>(
        value: &PrimitiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc(*value))
    }

    pub(crate) fn serialize_option<S: Serializer>(
        value: &Option<PrimitiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }
}
