//! Turning a timezone name into a zone.

use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::ParseError;

/// Resolves the calendar's `X-WR-TIMEZONE` value.
///
/// The parser falls back to UTC and records the error when resolution fails.
pub trait TimezoneResolver {
    fn resolve(&self, name: &str) -> Result<Tz, ParseError>;
}

/// Looks names up in the IANA database bundled with `chrono-tz`.
///
/// An empty name is UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChronoTzResolver;

impl TimezoneResolver for ChronoTzResolver {
    fn resolve(&self, name: &str) -> Result<Tz, ParseError> {
        let normalized = name.trim().trim_matches('"');
        if normalized.is_empty() {
            return Ok(Tz::UTC);
        }

        Tz::from_str(normalized).map_err(|e| ParseError::UnknownTimezone {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl<F> TimezoneResolver for F
where
    F: Fn(&str) -> Result<Tz, ParseError>,
{
    fn resolve(&self, name: &str) -> Result<Tz, ParseError> {
        self(name)
    }
}
