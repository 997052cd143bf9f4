//! Decoders for the typed values found in property text: instants,
//! durations, coordinates and recurrence rules.
//!
//! All of them are forgiving. A missing or malformed value decodes to the
//! type's zero value instead of an error, so a single broken line never stops
//! the rest of a feed from being read.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    components::Geo,
    parser::{field, find_property},
    ICS_FORMAT, ICS_FORMAT_WHOLE_DAY,
};

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([+-])?P(?:([0-9]+)Y)?(?:([0-9]+)M)?(?:([0-9]+)W)?(?:([0-9]+)D)?(?:T(?:([0-9]+)H)?(?:([0-9]+)M)?(?:([0-9]+)S)?)?$",
    )
    .unwrap()
});

/// The value used for absent or unreadable instants.
pub fn zero_instant() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Reads a timed literal. A missing trailing `Z` is added, so the digits are
/// always taken as UTC wall-clock time.
pub fn parse_ics_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let parsed = if value.ends_with('Z') {
        NaiveDateTime::parse_from_str(value, ICS_FORMAT)
    } else {
        NaiveDateTime::parse_from_str(&format!("{}Z", value), ICS_FORMAT)
    };

    parsed.ok().map(|d| Utc.from_utc_datetime(&d))
}

/// Reads a `YYYYMMDD` literal as midnight UTC of that day.
pub fn parse_ics_date(value: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), ICS_FORMAT_WHOLE_DAY).ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Decodes a date-valued property such as `DTSTART` or `DTEND`.
///
/// Returns the instant together with the `TZID` parameter (empty when there
/// is none). The zone is reported, not applied. Whole-day values
/// (`VALUE=DATE`) never carry a zone. An absent or malformed property gives
/// [`zero_instant`] and an empty zone.
pub fn parse_time_field(block: &str, name: &str) -> (DateTime<Utc>, String) {
    let property = match find_property(block, name) {
        Some(property) => property,
        None => return (zero_instant(), String::new()),
    };
    let parameters = property.parameter_set();

    if parameters.is_date_value() {
        let instant = parse_ics_date(&property.value).unwrap_or_else(zero_instant);
        return (instant, String::new());
    }

    let tzid = parameters.get_tzid().unwrap_or_default().to_string();
    let instant = parse_ics_time(&property.value).unwrap_or_else(zero_instant);

    (instant, tzid)
}

/// Decodes a UTC timestamp property such as `CREATED` or `LAST-MODIFIED`.
pub fn parse_timestamp_field(block: &str, name: &str) -> DateTime<Utc> {
    let value = field(block, name);
    NaiveDateTime::parse_from_str(&value, ICS_FORMAT)
        .map(|d| Utc.from_utc_datetime(&d))
        .unwrap_or_else(|_| zero_instant())
}

/// Parses an ISO 8601 duration (`PnYnMnWnDTnHnMnS`, optionally signed).
///
/// Years count as 365 days and months as 30 days.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let captures = DURATION.captures(value.trim())?;

    let units = [
        Duration::try_days(365)?,
        Duration::try_days(30)?,
        Duration::try_weeks(1)?,
        Duration::try_days(1)?,
        Duration::try_hours(1)?,
        Duration::try_minutes(1)?,
        Duration::try_seconds(1)?,
    ];

    let mut duration = Duration::zero();
    for (index, unit) in units.iter().enumerate() {
        if let Some(digits) = captures.get(index + 2) {
            let amount: i32 = digits.as_str().parse().ok()?;
            duration = duration.checked_add(&unit.checked_mul(amount)?)?;
        }
    }

    if captures.get(1).map(|m| m.as_str()) == Some("-") {
        duration = -duration;
    }

    Some(duration)
}

/// The event's `DURATION`, zero when absent or malformed.
pub fn parse_duration_field(block: &str) -> Duration {
    parse_duration(&field(block, "DURATION")).unwrap_or_else(Duration::zero)
}

/// `GEO:lat;lon`. Both halves must be numbers, otherwise there is no value.
pub fn parse_geo(block: &str) -> Option<Geo> {
    let value = field(block, "GEO");
    let (latitude, longitude) = value.split(';').next_tuple()?;

    Some(Geo {
        latitude: latitude.trim().parse().ok()?,
        longitude: longitude.trim().parse().ok()?,
    })
}

/// Integer property such as `SEQUENCE`, zero when absent or not a number.
pub fn parse_number_field(block: &str, name: &str) -> u32 {
    field(block, name).parse().unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Missing, or a frequency we do not step through (e.g. `HOURLY`).
    Unsupported,
}

impl Frequency {
    fn from_token(token: &str) -> Frequency {
        match &token.to_ascii_uppercase() as &str {
            "DAILY" => Frequency::Daily,
            "WEEKLY" => Frequency::Weekly,
            "MONTHLY" => Frequency::Monthly,
            "YEARLY" => Frequency::Yearly,
            _ => Frequency::Unsupported,
        }
    }

    /// How many units of this frequency one expansion step covers.
    ///
    /// Weekly rules always move one week, whatever their `INTERVAL`.
    /// Unsupported frequencies do not move at all.
    pub fn units_per_step(self, interval: u32) -> u32 {
        match self {
            Frequency::Daily | Frequency::Monthly | Frequency::Yearly => interval,
            Frequency::Weekly => 1,
            Frequency::Unsupported => 0,
        }
    }

    /// Create a date that has been advanced by `units` of the frequency.
    ///
    /// Month and year arithmetic clamps to the end of shorter months, e.g.
    /// Jan 31 plus one month is Feb 29 in a leap year.
    pub fn advance_date(self, date: DateTime<Utc>, units: u32) -> Option<DateTime<Utc>> {
        match self {
            Frequency::Daily => date.checked_add_signed(Duration::try_days(units.into())?),
            Frequency::Weekly => date.checked_add_signed(Duration::try_weeks(units.into())?),
            Frequency::Monthly => date.checked_add_months(Months::new(units)),
            Frequency::Yearly => date.checked_add_months(Months::new(units.checked_mul(12)?)),
            Frequency::Unsupported => Some(date),
        }
    }
}

/// The parts of an `RRULE` the expander understands.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurRule {
    pub frequency: Frequency,
    pub interval: u32,
    /// `None` when the rule has no usable `COUNT`.
    pub count: Option<u32>,
    /// Inclusive upper bound on occurrence starts.
    pub until: Option<DateTime<Utc>>,
    pub by_month: Vec<u32>,
    pub by_day: Vec<Weekday>,
}

impl RecurRule {
    /// Decodes an `RRULE` value. Unknown or malformed parts are ignored.
    pub fn parse(rule_value_string: &str) -> RecurRule {
        let mut frequency = Frequency::Unsupported;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;
        let mut by_month = Vec::new();
        let mut by_day = Vec::new();

        for part in rule_value_string.trim().split(';') {
            let (name, value) = match part.split_once('=') {
                Some(split) => split,
                None => continue,
            };
            let value = value.trim();

            match &name.trim().to_ascii_uppercase() as &str {
                "FREQ" => frequency = Frequency::from_token(value),
                "INTERVAL" => {
                    interval = value.parse::<u32>().ok().filter(|i| *i > 0).unwrap_or(1)
                }
                "COUNT" => count = value.parse::<u32>().ok().filter(|c| *c > 0),
                "UNTIL" => {
                    until = if value.contains('T') {
                        parse_ics_time(value)
                    } else {
                        parse_ics_date(value)
                    }
                }
                "BYMONTH" => {
                    by_month = value
                        .split(',')
                        .filter_map(|m| m.trim().parse::<u32>().ok())
                        .filter(|m| (1..=12).contains(m))
                        .collect()
                }
                "BYDAY" => by_day = value.split(',').filter_map(weekday_from_ics).collect(),
                _ => {}
            }
        }

        RecurRule {
            frequency,
            interval,
            count,
            until,
            by_month,
            by_day,
        }
    }

    /// Whether an occurrence in the month of `date` passes `BYMONTH`.
    pub fn matches_month(&self, date: DateTime<Utc>) -> bool {
        self.by_month.is_empty() || self.by_month.contains(&date.month())
    }

    pub fn matches_day(&self, date: DateTime<Utc>) -> bool {
        self.by_day.contains(&date.weekday())
    }

    /// Whether an occurrence starting at `date` lies within `UNTIL`.
    pub fn within_until(&self, date: DateTime<Utc>) -> bool {
        self.until.map_or(true, |until| date <= until)
    }
}

/// Reads a `BYDAY` token such as `MO`, `1MO` or `-1SU`. Any ordinal prefix is
/// dropped.
pub fn weekday_from_ics(token: &str) -> Option<Weekday> {
    let day = token
        .trim()
        .trim_start_matches(|c: char| c == '+' || c == '-' || c.is_ascii_digit());

    match &day.to_ascii_uppercase() as &str {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_to_ics(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    #[test]
    fn timed_literal_with_and_without_z() {
        assert_eq!(
            parse_ics_time("20240101T100000Z"),
            Some(utc("2024-01-01 10:00:00"))
        );
        assert_eq!(
            parse_ics_time("20240101T100000"),
            Some(utc("2024-01-01 10:00:00"))
        );
        assert_eq!(parse_ics_time("2024-01-01"), None);
    }

    #[test]
    fn time_field_keeps_tzid_without_shifting() {
        let block = "DTSTART;TZID=Europe/London:20220208T153000\r\n";
        let (start, tzid) = parse_time_field(block, "DTSTART");
        assert_eq!(start, utc("2022-02-08 15:30:00"));
        assert_eq!(tzid, "Europe/London");
    }

    #[test]
    fn time_field_with_explicit_date_time_value() {
        let block = "DTEND;TZID=America/New_York;VALUE=DATE-TIME:20240105T090000\n";
        let (end, tzid) = parse_time_field(block, "DTEND");
        assert_eq!(end, utc("2024-01-05 09:00:00"));
        assert_eq!(tzid, "America/New_York");
    }

    #[test]
    fn whole_day_field() {
        let (start, tzid) = parse_time_field("DTSTART;VALUE=DATE:20240301\n", "DTSTART");
        assert_eq!(start, utc("2024-03-01 00:00:00"));
        assert_eq!(tzid, "");
    }

    #[test]
    fn missing_or_malformed_time_field_is_zero() {
        assert_eq!(
            parse_time_field("SUMMARY:x\n", "DTSTART"),
            (zero_instant(), String::new())
        );
        assert_eq!(parse_time_field("DTSTART:garbage\n", "DTSTART").0, zero_instant());
    }

    #[test]
    fn timestamps() {
        assert_eq!(
            parse_timestamp_field("CREATED:20230901T120000Z\n", "CREATED"),
            utc("2023-09-01 12:00:00")
        );
        assert_eq!(parse_timestamp_field("CREATED:soon\n", "CREATED"), zero_instant());
    }

    macro_rules! duration_test {
        ($name:ident, $input:expr => $expected:expr) => {
            #[test]
            fn $name() {
                assert_eq!(parse_duration($input), $expected);
            }
        };
    }

    duration_test!(duration_hour, "PT1H" => Some(Duration::hours(1)));
    duration_test!(duration_negative, "-PT15M" => Some(Duration::minutes(-15)));
    duration_test!(duration_days_and_time, "P15DT5H0M20S" => Some(Duration::days(15) + Duration::hours(5) + Duration::seconds(20)));
    duration_test!(duration_weeks, "P2W" => Some(Duration::weeks(2)));
    duration_test!(duration_year_month, "P1Y1M" => Some(Duration::days(395)));
    duration_test!(duration_malformed, "1 hour" => None);
    duration_test!(duration_empty, "" => None);

    #[test]
    fn duration_field_defaults_to_zero() {
        assert_eq!(parse_duration_field("DURATION:PTXH\n"), Duration::zero());
        assert_eq!(parse_duration_field("DURATION:PT90M\n"), Duration::minutes(90));
    }

    #[test]
    fn geo() {
        assert_eq!(
            parse_geo("GEO:37.386013;-122.082932\n"),
            Some(Geo {
                latitude: 37.386013,
                longitude: -122.082932
            })
        );
        assert_eq!(parse_geo("GEO:37.386013\n"), None);
        assert_eq!(parse_geo("GEO:north;-122.08\n"), None);
        assert_eq!(parse_geo("SUMMARY:x\n"), None);
    }

    #[test]
    fn recur_rule_parse_basic() {
        assert_eq!(
            RecurRule::parse("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE;UNTIL=20240115T000000Z"),
            RecurRule {
                frequency: Frequency::Weekly,
                interval: 2,
                count: None,
                until: Some(utc("2024-01-15 00:00:00")),
                by_month: vec![],
                by_day: vec![Weekday::Mon, Weekday::Wed],
            }
        );
    }

    #[test]
    fn recur_rule_parse_defaults() {
        assert_eq!(
            RecurRule::parse("FREQ=secondly;INTERVAL=0;COUNT=abc;BYMONTH=1,13,x;BYDAY=-1SU,XX"),
            RecurRule {
                frequency: Frequency::Unsupported,
                interval: 1,
                count: None,
                until: None,
                by_month: vec![1],
                by_day: vec![Weekday::Sun],
            }
        );
    }

    #[test]
    fn recur_rule_until_date_only() {
        let rule = RecurRule::parse("FREQ=DAILY;UNTIL=20240110");
        assert_eq!(rule.until, Some(utc("2024-01-10 00:00:00")));
        assert!(rule.within_until(utc("2024-01-10 00:00:00")));
        assert!(!rule.within_until(utc("2024-01-10 00:00:01")));
    }

    #[test]
    fn test_advance_date() {
        let start = utc("2000-01-31 09:30:00");
        assert_eq!(
            Frequency::Daily.advance_date(start, 2),
            Some(utc("2000-02-02 09:30:00"))
        );
        assert_eq!(
            Frequency::Weekly.advance_date(start, 2),
            Some(utc("2000-02-14 09:30:00"))
        );
        assert_eq!(
            Frequency::Monthly.advance_date(start, 1),
            Some(utc("2000-02-29 09:30:00"))
        );
        assert_eq!(
            Frequency::Monthly.advance_date(start, 12),
            Some(utc("2001-01-31 09:30:00"))
        );
        assert_eq!(
            Frequency::Yearly.advance_date(start, 3),
            Some(utc("2003-01-31 09:30:00"))
        );
        assert_eq!(Frequency::Unsupported.advance_date(start, 5), Some(start));
    }

    #[test]
    fn weekly_ignores_interval() {
        assert_eq!(Frequency::Weekly.units_per_step(3), 1);
        assert_eq!(Frequency::Daily.units_per_step(3), 3);
        assert_eq!(Frequency::Unsupported.units_per_step(3), 0);
    }

    #[test]
    fn weekday_tokens() {
        for day in [Weekday::Mon, Weekday::Sat, Weekday::Sun] {
            assert_eq!(weekday_from_ics(weekday_to_ics(day)), Some(day));
        }
        assert_eq!(weekday_from_ics("+2TU"), Some(Weekday::Tue));
        assert_eq!(weekday_from_ics("ST"), None);
    }
}
